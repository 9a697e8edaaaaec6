//! Analytics module: leaderboards, commission totals, content revenue and
//! wallet reconciliation. Derived data only; nothing here mutates balances.

pub mod models;
pub mod reader;

pub use models::{
    CommissionSummary, CommissionTotals, ContentRevenue, LeaderboardEntry, LeaderboardSnapshot,
};
pub use reader::{AnalyticsReader, LeaderboardCache};
