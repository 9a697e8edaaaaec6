//! Analytics data models. Everything here is derived from the ledger and can
//! be recomputed at any time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::unlock::ContentKind;

/// One row of a sender or receiver leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub display_name: String,
    /// Coins sent (gross price) or received (net of commission)
    pub total_coins: i64,
    pub gift_count: i64,
}

/// Commission collected over one period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionTotals {
    pub commission: i64,
    /// Sum of gift prices the commission was taken from
    pub gross: i64,
    pub gift_count: i64,
}

/// Commission totals for the standard reporting periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSummary {
    /// Since 00:00 UTC today
    pub today: CommissionTotals,
    /// Last 7 days
    pub week: CommissionTotals,
    /// Last 30 days
    pub month: CommissionTotals,
    pub all_time: CommissionTotals,
    pub generated_at: DateTime<Utc>,
}

/// Revenue attributed to one content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRevenue {
    pub content_id: i64,
    pub title: String,
    pub kind: ContentKind,
    pub unlock_count: i64,
    pub unlock_cost: i64,
    /// `unlock_count * unlock_cost`
    pub revenue: i64,
    pub view_count: i64,
    /// `unlock_count / view_count * 100`, 0 when there are no views
    pub conversion_rate: f64,
}

/// Cached leaderboards served to request handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub top_senders: Vec<LeaderboardEntry>,
    pub top_receivers: Vec<LeaderboardEntry>,
    /// `None` until the first refresh completes
    pub refreshed_at: Option<DateTime<Utc>>,
}
