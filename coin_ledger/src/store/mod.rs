//! Ledger store: persisted balances plus the append-only transaction log.
//!
//! All writes go through a [`UnitOfWork`] obtained from [`LedgerStore::begin`].
//! A unit either commits every change it staged or none of them: dropping a
//! unit without calling [`UnitOfWork::commit`] rolls it back. This is what
//! makes timeouts and cancellation safe for the coordinators.
//!
//! Two backends are provided:
//!
//! - [`PgLedgerStore`]: PostgreSQL, one database transaction per unit.
//! - [`MemoryLedgerStore`]: in-process, units serialized by an async mutex,
//!   with fault injection for atomicity tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::analytics::{CommissionTotals, LeaderboardEntry};
use crate::errors::LedgerResult;
use crate::gift::{CommissionRecord, GiftTransfer};
use crate::purchase::{NewPurchaseRequest, PurchaseRequest, PurchaseResolution, PurchaseStatus};
use crate::unlock::Content;
use crate::wallet::{LedgerEntry, NewLedgerEntry, Reconciliation, UserProfile, Wallet};

pub mod memory;
pub mod postgres;

pub use memory::{FailPoint, MemoryLedgerStore};
pub use postgres::PgLedgerStore;

/// Filter for purchase request listings.
///
/// Listings run in submission order unless `newest_first` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurchaseFilter {
    pub status: Option<PurchaseStatus>,
    pub user_id: Option<i64>,
    pub newest_first: bool,
}

/// Read side of the ledger plus the entry point for atomic writes.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a unit of work.
    async fn begin(&self) -> LedgerResult<Box<dyn UnitOfWork>>;

    /// Check that the backend is reachable
    async fn health_check(&self) -> LedgerResult<()>;

    async fn user(&self, user_id: i64) -> LedgerResult<Option<UserProfile>>;

    async fn wallet(&self, user_id: i64) -> LedgerResult<Option<Wallet>>;

    /// Newest entries first
    async fn entries(&self, user_id: i64, limit: i64) -> LedgerResult<Vec<LedgerEntry>>;

    /// Balance versus ledger audit; `None` when the wallet does not exist
    async fn reconciliation(&self, user_id: i64) -> LedgerResult<Option<Reconciliation>>;

    async fn gift_transfer(&self, id: Uuid) -> LedgerResult<Option<GiftTransfer>>;

    async fn content(&self, content_id: i64) -> LedgerResult<Option<Content>>;

    async fn is_unlocked(&self, user_id: i64, content_id: i64) -> LedgerResult<bool>;

    async fn purchase_request(&self, request_id: i64) -> LedgerResult<Option<PurchaseRequest>>;

    /// Oldest first
    async fn purchase_requests(
        &self,
        filter: PurchaseFilter,
        limit: i64,
    ) -> LedgerResult<Vec<PurchaseRequest>>;

    /// Bump the cumulative gift counters on both profiles.
    ///
    /// Best-effort statistics, never called inside a unit of work.
    async fn record_gift_stats(
        &self,
        sender_id: i64,
        recipient_id: i64,
        coins_sent: i64,
        coins_received: i64,
    ) -> LedgerResult<()>;

    /// Users ranked by coins sent since `since`
    async fn top_senders(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> LedgerResult<Vec<LeaderboardEntry>>;

    /// Users ranked by coins received since `since`
    async fn top_receivers(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> LedgerResult<Vec<LeaderboardEntry>>;

    /// Commission collected since `since`, or over all time
    async fn commission_totals(&self, since: Option<DateTime<Utc>>)
    -> LedgerResult<CommissionTotals>;

    /// Premium content ranked by unlock count
    async fn top_content(&self, limit: i64) -> LedgerResult<Vec<Content>>;
}

/// Atomic set of ledger writes.
///
/// Reads through a unit observe its own staged writes.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn user(&mut self, user_id: i64) -> LedgerResult<Option<UserProfile>>;

    async fn wallet(&mut self, user_id: i64) -> LedgerResult<Option<Wallet>>;

    /// Insert a zero-balance wallet for `profile` unless one exists; returns
    /// the wallet either way.
    async fn create_wallet(&mut self, profile: &UserProfile) -> LedgerResult<Wallet>;

    /// Row-lock the given wallets in ascending id order for the rest of the unit.
    async fn lock_wallets(&mut self, user_ids: &[i64]) -> LedgerResult<()>;

    /// `balance -= amount` only if `balance >= amount`; returns the new balance,
    /// or `None` when the guard failed or the wallet does not exist.
    async fn debit_balance(&mut self, user_id: i64, amount: i64) -> LedgerResult<Option<i64>>;

    /// `balance += amount` unless it would overflow; returns the new balance,
    /// or `None` when the guard failed or the wallet does not exist.
    async fn credit_balance(&mut self, user_id: i64, amount: i64) -> LedgerResult<Option<i64>>;

    async fn append_entry(&mut self, entry: NewLedgerEntry) -> LedgerResult<LedgerEntry>;

    async fn insert_gift_transfer(&mut self, transfer: &GiftTransfer) -> LedgerResult<()>;

    async fn insert_commission_record(
        &mut self,
        transfer: &GiftTransfer,
    ) -> LedgerResult<CommissionRecord>;

    async fn is_unlocked(&mut self, user_id: i64, content_id: i64) -> LedgerResult<bool>;

    /// Read the content row, locking it for the rest of the unit.
    async fn lock_content(&mut self, content_id: i64) -> LedgerResult<Option<Content>>;

    /// Add `content_id` to the user's unlocked set; `false` if already present.
    async fn grant_unlock(&mut self, user_id: i64, content_id: i64, cost: i64)
    -> LedgerResult<bool>;

    /// Returns the new unlock count
    async fn increment_unlock_count(&mut self, content_id: i64) -> LedgerResult<i64>;

    /// `None` when the payment reference was already used
    async fn insert_purchase_request(
        &mut self,
        request: &NewPurchaseRequest,
    ) -> LedgerResult<Option<PurchaseRequest>>;

    /// Read the request row, locking it for the rest of the unit.
    async fn lock_purchase_request(
        &mut self,
        request_id: i64,
    ) -> LedgerResult<Option<PurchaseRequest>>;

    async fn resolve_purchase_request(
        &mut self,
        request_id: i64,
        resolution: &PurchaseResolution,
    ) -> LedgerResult<PurchaseRequest>;

    /// Apply every staged change.
    async fn commit(self: Box<Self>) -> LedgerResult<()>;
}
