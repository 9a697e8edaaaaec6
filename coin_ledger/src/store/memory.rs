//! In-process ledger store.
//!
//! Units of work hold an owned lock on the whole state for their lifetime and
//! write through it after taking a checkpoint. Commit discards the checkpoint;
//! dropping an uncommitted unit restores it. Units are therefore fully
//! serialized, which trivially satisfies the debit guard.
//!
//! Used by tests, benches and local development. Fault injection
//! ([`FailPoint`], [`MemoryLedgerStore::set_commit_delay`]) lets tests force a
//! unit to fail at a chosen step.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{LedgerStore, PurchaseFilter, UnitOfWork};
use crate::analytics::{CommissionTotals, LeaderboardEntry};
use crate::errors::{LedgerError, LedgerResult};
use crate::gift::{CommissionRecord, GiftTransfer};
use crate::purchase::{NewPurchaseRequest, PurchaseRequest, PurchaseResolution, PurchaseStatus};
use crate::unlock::Content;
use crate::wallet::{LedgerEntry, NewLedgerEntry, Reconciliation, UserProfile, Wallet};

/// Step at which an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateWallet,
    DebitBalance,
    CreditBalance,
    AppendEntry,
    InsertGiftTransfer,
    InsertCommissionRecord,
    GrantUnlock,
    IncrementUnlockCount,
    InsertPurchaseRequest,
    ResolvePurchaseRequest,
    Commit,
    /// Best-effort gift statistics, outside any unit
    GiftStats,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<i64, UserProfile>,
    wallets: HashMap<i64, Wallet>,
    entries: Vec<LedgerEntry>,
    gifts: Vec<GiftTransfer>,
    commissions: Vec<CommissionRecord>,
    contents: HashMap<i64, Content>,
    unlocked: HashSet<(i64, i64)>,
    purchases: BTreeMap<i64, PurchaseRequest>,
    next_entry_id: i64,
    next_commission_id: i64,
    next_purchase_id: i64,
}

/// Everything a unit may change, minus the append-only logs which only need
/// their length recorded.
#[derive(Debug)]
struct Checkpoint {
    wallets: HashMap<i64, Wallet>,
    contents: HashMap<i64, Content>,
    unlocked: HashSet<(i64, i64)>,
    purchases: BTreeMap<i64, PurchaseRequest>,
    entries_len: usize,
    gifts_len: usize,
    commissions_len: usize,
    next_entry_id: i64,
    next_commission_id: i64,
    next_purchase_id: i64,
}

impl Checkpoint {
    fn take(state: &MemoryState) -> Self {
        Self {
            wallets: state.wallets.clone(),
            contents: state.contents.clone(),
            unlocked: state.unlocked.clone(),
            purchases: state.purchases.clone(),
            entries_len: state.entries.len(),
            gifts_len: state.gifts.len(),
            commissions_len: state.commissions.len(),
            next_entry_id: state.next_entry_id,
            next_commission_id: state.next_commission_id,
            next_purchase_id: state.next_purchase_id,
        }
    }

    fn restore(self, state: &mut MemoryState) {
        state.wallets = self.wallets;
        state.contents = self.contents;
        state.unlocked = self.unlocked;
        state.purchases = self.purchases;
        state.entries.truncate(self.entries_len);
        state.gifts.truncate(self.gifts_len);
        state.commissions.truncate(self.commissions_len);
        state.next_entry_id = self.next_entry_id;
        state.next_commission_id = self.next_commission_id;
        state.next_purchase_id = self.next_purchase_id;
    }
}

#[derive(Debug, Default)]
struct Faults {
    armed: HashSet<FailPoint>,
    commit_delay: Option<Duration>,
}

impl Faults {
    /// Fires (and disarms) `point` if armed.
    fn trip(faults: &StdMutex<Faults>, point: FailPoint) -> LedgerResult<()> {
        let mut faults = faults.lock().unwrap_or_else(|e| e.into_inner());
        if faults.armed.remove(&point) {
            return Err(LedgerError::Storage(format!("injected failure at {point:?}")));
        }
        Ok(())
    }
}

/// In-memory ledger store
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<StdMutex<Faults>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user profile (normally owned by the identity service).
    pub async fn insert_user(&self, profile: UserProfile) {
        self.state.lock().await.users.insert(profile.id, profile);
    }

    pub async fn set_user_active(&self, user_id: i64, active: bool) {
        if let Some(user) = self.state.lock().await.users.get_mut(&user_id) {
            user.is_active = active;
        }
    }

    /// Register a content item (normally owned by the catalog service).
    pub async fn insert_content(&self, content: Content) {
        self.state.lock().await.contents.insert(content.id, content);
    }

    /// Count a view, as the catalog service would.
    pub async fn record_view(&self, content_id: i64) {
        if let Some(content) = self.state.lock().await.contents.get_mut(&content_id) {
            content.view_count += 1;
        }
    }

    /// Sum of every wallet balance.
    pub async fn total_balance(&self) -> i64 {
        self.state.lock().await.wallets.values().map(|w| w.balance).sum()
    }

    /// Arm a one-shot failure at `point`.
    pub fn inject_failure(&self, point: FailPoint) {
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        faults.armed.insert(point);
    }

    pub fn clear_failures(&self) {
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        faults.armed.clear();
        faults.commit_delay = None;
    }

    /// Make every commit stall for `delay` before applying.
    pub fn set_commit_delay(&self, delay: Option<Duration>) {
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        faults.commit_delay = delay;
    }

    fn trip(&self, point: FailPoint) -> LedgerResult<()> {
        Faults::trip(&self.faults, point)
    }
}

fn leaderboard<F>(gifts: &[GiftTransfer], since: DateTime<Utc>, limit: i64, pick: F) -> Vec<LeaderboardEntry>
where
    F: Fn(&GiftTransfer) -> (i64, &str, i64),
{
    let mut totals: HashMap<i64, LeaderboardEntry> = HashMap::new();
    for gift in gifts.iter().filter(|g| g.created_at >= since) {
        let (user_id, name, coins) = pick(gift);
        let entry = totals.entry(user_id).or_insert_with(|| LeaderboardEntry {
            user_id,
            display_name: name.to_string(),
            total_coins: 0,
            gift_count: 0,
        });
        entry.total_coins += coins;
        entry.gift_count += 1;
    }

    let mut ranked: Vec<_> = totals.into_values().collect();
    ranked.sort_by(|a, b| b.total_coins.cmp(&a.total_coins).then(a.user_id.cmp(&b.user_id)));
    ranked.truncate(limit.max(0) as usize);
    ranked
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> LedgerResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let checkpoint = Checkpoint::take(&guard);
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            checkpoint: Some(checkpoint),
            faults: self.faults.clone(),
        }))
    }

    async fn health_check(&self) -> LedgerResult<()> {
        Ok(())
    }

    async fn user(&self, user_id: i64) -> LedgerResult<Option<UserProfile>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn wallet(&self, user_id: i64) -> LedgerResult<Option<Wallet>> {
        Ok(self.state.lock().await.wallets.get(&user_id).cloned())
    }

    async fn entries(&self, user_id: i64, limit: i64) -> LedgerResult<Vec<LedgerEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn reconciliation(&self, user_id: i64) -> LedgerResult<Option<Reconciliation>> {
        let state = self.state.lock().await;
        let Some(wallet) = state.wallets.get(&user_id) else {
            return Ok(None);
        };

        let entries: Vec<_> = state.entries.iter().filter(|e| e.user_id == user_id).collect();
        Ok(Some(Reconciliation {
            user_id,
            balance: wallet.balance,
            ledger_sum: entries.iter().map(|e| e.amount).sum(),
            last_balance_after: entries.last().map(|e| e.balance_after),
            entry_count: entries.len() as i64,
        }))
    }

    async fn gift_transfer(&self, id: Uuid) -> LedgerResult<Option<GiftTransfer>> {
        let state = self.state.lock().await;
        Ok(state.gifts.iter().find(|g| g.id == id).cloned())
    }

    async fn content(&self, content_id: i64) -> LedgerResult<Option<Content>> {
        Ok(self.state.lock().await.contents.get(&content_id).cloned())
    }

    async fn is_unlocked(&self, user_id: i64, content_id: i64) -> LedgerResult<bool> {
        Ok(self.state.lock().await.unlocked.contains(&(user_id, content_id)))
    }

    async fn purchase_request(&self, request_id: i64) -> LedgerResult<Option<PurchaseRequest>> {
        Ok(self.state.lock().await.purchases.get(&request_id).cloned())
    }

    async fn purchase_requests(
        &self,
        filter: PurchaseFilter,
        limit: i64,
    ) -> LedgerResult<Vec<PurchaseRequest>> {
        let state = self.state.lock().await;
        let limit = limit.max(0) as usize;
        let matching = state
            .purchases
            .values()
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .filter(|r| filter.user_id.is_none_or(|u| r.user_id == u));

        Ok(if filter.newest_first {
            matching.rev().take(limit).cloned().collect()
        } else {
            matching.take(limit).cloned().collect()
        })
    }

    async fn record_gift_stats(
        &self,
        sender_id: i64,
        recipient_id: i64,
        coins_sent: i64,
        coins_received: i64,
    ) -> LedgerResult<()> {
        self.trip(FailPoint::GiftStats)?;
        let mut state = self.state.lock().await;
        if let Some(sender) = state.users.get_mut(&sender_id) {
            sender.coins_sent += coins_sent;
        }
        if let Some(recipient) = state.users.get_mut(&recipient_id) {
            recipient.coins_received += coins_received;
        }
        Ok(())
    }

    async fn top_senders(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> LedgerResult<Vec<LeaderboardEntry>> {
        let state = self.state.lock().await;
        Ok(leaderboard(&state.gifts, since, limit, |g| {
            (g.sender_id, g.sender_name.as_str(), g.price)
        }))
    }

    async fn top_receivers(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> LedgerResult<Vec<LeaderboardEntry>> {
        let state = self.state.lock().await;
        Ok(leaderboard(&state.gifts, since, limit, |g| {
            (g.recipient_id, g.recipient_name.as_str(), g.recipient_amount)
        }))
    }

    async fn commission_totals(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> LedgerResult<CommissionTotals> {
        let state = self.state.lock().await;
        Ok(state
            .commissions
            .iter()
            .filter(|c| since.is_none_or(|s| c.created_at >= s))
            .fold(CommissionTotals::default(), |mut acc, c| {
                acc.commission += c.commission_amount;
                acc.gross += c.original_price;
                acc.gift_count += 1;
                acc
            }))
    }

    async fn top_content(&self, limit: i64) -> LedgerResult<Vec<Content>> {
        let state = self.state.lock().await;
        let mut ranked: Vec<_> = state.contents.values().filter(|c| c.is_premium).cloned().collect();
        ranked.sort_by(|a, b| b.unlock_count.cmp(&a.unlock_count).then(a.id.cmp(&b.id)));
        ranked.truncate(limit.max(0) as usize);
        Ok(ranked)
    }
}

/// Unit of work over [`MemoryLedgerStore`]
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    /// `None` once committed
    checkpoint: Option<Checkpoint>,
    faults: Arc<StdMutex<Faults>>,
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if let Some(checkpoint) = self.checkpoint.take() {
            checkpoint.restore(&mut self.guard);
        }
    }
}

impl MemoryUnitOfWork {
    fn trip(&self, point: FailPoint) -> LedgerResult<()> {
        Faults::trip(&self.faults, point)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn user(&mut self, user_id: i64) -> LedgerResult<Option<UserProfile>> {
        Ok(self.guard.users.get(&user_id).cloned())
    }

    async fn wallet(&mut self, user_id: i64) -> LedgerResult<Option<Wallet>> {
        Ok(self.guard.wallets.get(&user_id).cloned())
    }

    async fn create_wallet(&mut self, profile: &UserProfile) -> LedgerResult<Wallet> {
        self.trip(FailPoint::CreateWallet)?;
        let now = Utc::now();
        let wallet = self
            .guard
            .wallets
            .entry(profile.id)
            .or_insert_with(|| Wallet {
                wallet_id: profile.id,
                user_id: profile.id,
                owner_name: profile.display_name.clone(),
                balance: 0,
                created_at: now,
                updated_at: now,
            });
        Ok(wallet.clone())
    }

    async fn lock_wallets(&mut self, _user_ids: &[i64]) -> LedgerResult<()> {
        // The unit already holds the store-wide lock
        Ok(())
    }

    async fn debit_balance(&mut self, user_id: i64, amount: i64) -> LedgerResult<Option<i64>> {
        self.trip(FailPoint::DebitBalance)?;
        match self.guard.wallets.get_mut(&user_id) {
            Some(wallet) if wallet.balance >= amount => {
                wallet.balance -= amount;
                wallet.updated_at = Utc::now();
                Ok(Some(wallet.balance))
            }
            _ => Ok(None),
        }
    }

    async fn credit_balance(&mut self, user_id: i64, amount: i64) -> LedgerResult<Option<i64>> {
        self.trip(FailPoint::CreditBalance)?;
        let Some(wallet) = self.guard.wallets.get_mut(&user_id) else {
            return Ok(None);
        };
        let Some(new_balance) = wallet.balance.checked_add(amount) else {
            return Ok(None);
        };
        wallet.balance = new_balance;
        wallet.updated_at = Utc::now();
        Ok(Some(new_balance))
    }

    async fn append_entry(&mut self, entry: NewLedgerEntry) -> LedgerResult<LedgerEntry> {
        self.trip(FailPoint::AppendEntry)?;

        let balance = self
            .guard
            .wallets
            .get(&entry.user_id)
            .map(|w| w.balance)
            .ok_or(LedgerError::WalletNotFound(entry.user_id))?;
        if entry.balance_after != entry.balance_before + entry.amount || entry.balance_after != balance {
            return Err(LedgerError::Storage(format!(
                "ledger entry for user {} does not match wallet balance {}",
                entry.user_id, balance
            )));
        }

        self.guard.next_entry_id += 1;
        let stored = LedgerEntry {
            id: self.guard.next_entry_id,
            wallet_id: entry.user_id,
            user_id: entry.user_id,
            kind: entry.kind,
            amount: entry.amount,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            description: entry.description,
            reference_id: entry.reference_id,
            metadata: entry.metadata,
            created_at: Utc::now(),
        };
        self.guard.entries.push(stored.clone());
        Ok(stored)
    }

    async fn insert_gift_transfer(&mut self, transfer: &GiftTransfer) -> LedgerResult<()> {
        self.trip(FailPoint::InsertGiftTransfer)?;
        self.guard.gifts.push(transfer.clone());
        Ok(())
    }

    async fn insert_commission_record(
        &mut self,
        transfer: &GiftTransfer,
    ) -> LedgerResult<CommissionRecord> {
        self.trip(FailPoint::InsertCommissionRecord)?;
        self.guard.next_commission_id += 1;
        let record = CommissionRecord {
            id: self.guard.next_commission_id,
            gift_transfer_id: transfer.id,
            commission_amount: transfer.commission,
            original_price: transfer.price,
            rate: transfer.commission_rate,
            created_at: transfer.created_at,
        };
        self.guard.commissions.push(record.clone());
        Ok(record)
    }

    async fn is_unlocked(&mut self, user_id: i64, content_id: i64) -> LedgerResult<bool> {
        Ok(self.guard.unlocked.contains(&(user_id, content_id)))
    }

    async fn lock_content(&mut self, content_id: i64) -> LedgerResult<Option<Content>> {
        Ok(self.guard.contents.get(&content_id).cloned())
    }

    async fn grant_unlock(
        &mut self,
        user_id: i64,
        content_id: i64,
        _cost: i64,
    ) -> LedgerResult<bool> {
        self.trip(FailPoint::GrantUnlock)?;
        Ok(self.guard.unlocked.insert((user_id, content_id)))
    }

    async fn increment_unlock_count(&mut self, content_id: i64) -> LedgerResult<i64> {
        self.trip(FailPoint::IncrementUnlockCount)?;
        let content = self
            .guard
            .contents
            .get_mut(&content_id)
            .ok_or(LedgerError::ContentNotFound(content_id))?;
        content.unlock_count += 1;
        Ok(content.unlock_count)
    }

    async fn insert_purchase_request(
        &mut self,
        request: &NewPurchaseRequest,
    ) -> LedgerResult<Option<PurchaseRequest>> {
        self.trip(FailPoint::InsertPurchaseRequest)?;
        if self
            .guard
            .purchases
            .values()
            .any(|r| r.payment_reference == request.payment_reference)
        {
            return Ok(None);
        }

        self.guard.next_purchase_id += 1;
        let stored = PurchaseRequest {
            id: self.guard.next_purchase_id,
            user_id: request.user_id,
            coin_amount: request.coin_amount,
            paid_amount: request.paid_amount,
            payment_reference: request.payment_reference.clone(),
            status: PurchaseStatus::Pending,
            requested_at: Utc::now(),
            processed_at: None,
            admin_note: None,
            ledger_entry_id: None,
        };
        self.guard.purchases.insert(stored.id, stored.clone());
        Ok(Some(stored))
    }

    async fn lock_purchase_request(
        &mut self,
        request_id: i64,
    ) -> LedgerResult<Option<PurchaseRequest>> {
        Ok(self.guard.purchases.get(&request_id).cloned())
    }

    async fn resolve_purchase_request(
        &mut self,
        request_id: i64,
        resolution: &PurchaseResolution,
    ) -> LedgerResult<PurchaseRequest> {
        self.trip(FailPoint::ResolvePurchaseRequest)?;
        let request = self
            .guard
            .purchases
            .get_mut(&request_id)
            .ok_or(LedgerError::RequestNotFound(request_id))?;
        request.status = resolution.status;
        request.admin_note = resolution.admin_note.clone();
        request.ledger_entry_id = resolution.ledger_entry_id;
        request.processed_at = Some(resolution.processed_at);
        Ok(request.clone())
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        let delay = self
            .faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .commit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.trip(FailPoint::Commit)?;

        let mut this = self;
        this.checkpoint = None;
        Ok(())
    }
}
