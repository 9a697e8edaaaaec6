//! Unlock module: one-time coin purchases of premium content.

pub mod coordinator;
pub mod models;

pub use coordinator::UnlockCoordinator;
pub use models::{Content, ContentKind, UnlockOutcome, UnlockPricing};
