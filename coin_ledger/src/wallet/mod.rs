//! Wallet module: balances and the append-only ledger behind them.
//!
//! Every balance change goes through [`WalletManager`] and writes exactly one
//! ledger entry in the same unit of work, so a wallet's balance always equals
//! the sum of its entries.
//!
//! ## Example
//!
//! ```no_run
//! use coin_ledger::store::MemoryLedgerStore;
//! use coin_ledger::wallet::{EntryKind, Posting, UserProfile, WalletManager};
//! use coin_ledger::EngineConfig;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryLedgerStore::new();
//!     store.insert_user(UserProfile::new(1, "alice", "Alice")).await;
//!
//!     let wallets = WalletManager::new(Arc::new(store), EngineConfig::default());
//!     wallets.get_or_create_wallet(1).await?;
//!     let balance = wallets
//!         .credit(1, 500, Posting::new(EntryKind::Credit, "Welcome bonus"))
//!         .await?;
//!     println!("Balance: {}", balance);
//!
//!     Ok(())
//! }
//! ```

pub mod manager;
pub mod models;

pub use manager::WalletManager;
pub use models::{
    EntryKind, LedgerEntry, NewLedgerEntry, Posting, Reconciliation, UserProfile, Wallet,
};
