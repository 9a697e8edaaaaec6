//! # Coin Ledger
//!
//! Virtual-currency ledger and transaction engine for a content platform:
//! users buy coins, send gifts to each other and spend coins to unlock
//! premium dramas and episodes.
//!
//! Every balance change is applied inside a single unit of work together with
//! its ledger entry, so no coins are created, destroyed or double-spent under
//! concurrent requests, and every wallet reconciles with its ledger.
//!
//! ## Core Modules
//!
//! - [`store`]: Ledger store trait, PostgreSQL and in-memory backends
//! - [`wallet`]: Wallet creation and credit/debit primitives
//! - [`gift`]: Commission split and atomic gift transfers
//! - [`unlock`]: One-time paid content unlocks
//! - [`purchase`]: Purchase approval workflow
//! - [`analytics`]: Leaderboards, commission and revenue reports
//! - [`engine`]: [`CoinEngine`] facade over all of the above
//!
//! ## Example
//!
//! ```no_run
//! use coin_ledger::store::MemoryLedgerStore;
//! use coin_ledger::wallet::UserProfile;
//! use coin_ledger::{CoinEngine, EngineConfig, SendGiftRequest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryLedgerStore::new();
//!     store.insert_user(UserProfile::new(1, "alice", "Alice")).await;
//!     store.insert_user(UserProfile::new(2, "bob", "Bob")).await;
//!
//!     let engine = CoinEngine::new(Arc::new(store), EngineConfig::default());
//!     engine.wallets().admin_credit(1, 500, None).await?;
//!
//!     let receipt = engine
//!         .send_gift(SendGiftRequest {
//!             sender_id: 1,
//!             recipient_id: 2,
//!             gift_id: "rose".into(),
//!             gift_name: "Rose".into(),
//!             price: 100,
//!             message: None,
//!         })
//!         .await?;
//!     println!("Bob received {}", receipt.transfer.recipient_amount);
//!
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod gift;
pub mod purchase;
pub mod store;
pub mod unlock;
pub mod wallet;

pub use config::{ConfigError, EngineConfig};
pub use engine::CoinEngine;
pub use errors::{LedgerError, LedgerResult};
pub use gift::{CommissionRate, GiftReceipt, SendGiftRequest};
pub use purchase::{PurchaseRequest, PurchaseStatus};
pub use unlock::{UnlockOutcome, UnlockPricing};
