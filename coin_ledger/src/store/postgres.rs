//! PostgreSQL ledger store.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, Row, Transaction, postgres::PgRow};
use std::sync::Arc;
use uuid::Uuid;

use super::{LedgerStore, PurchaseFilter, UnitOfWork};
use crate::analytics::{CommissionTotals, LeaderboardEntry};
use crate::errors::{LedgerError, LedgerResult};
use crate::gift::{CommissionRate, CommissionRecord, GiftTransfer, TransferStatus};
use crate::purchase::{NewPurchaseRequest, PurchaseRequest, PurchaseResolution};
use crate::unlock::Content;
use crate::wallet::{LedgerEntry, NewLedgerEntry, Reconciliation, UserProfile, Wallet};

const USER_COLUMNS: &str = "id, username, display_name, is_active, coins_sent, coins_received";
const WALLET_COLUMNS: &str = "wallet_id, user_id, owner_name, balance, created_at, updated_at";
const ENTRY_COLUMNS: &str = "transaction_id, wallet_id, user_id, kind, amount, balance_before, \
     balance_after, description, reference_id, metadata, created_at";
const CONTENT_COLUMNS: &str = "id, title, kind, is_premium, is_active, view_count, unlock_count";
const PURCHASE_COLUMNS: &str = "id, user_id, coin_amount, paid_amount, payment_reference, status, \
     requested_at, processed_at, admin_note, ledger_entry_id";
const TRANSFER_COLUMNS: &str = "id, sender_id, sender_name, recipient_id, recipient_name, gift_id, \
     gift_name, price, recipient_amount, commission, commission_rate_bps, sender_tx_id, \
     recipient_tx_id, commission_tx_id, message, status, created_at";

fn user_from_row(row: &PgRow) -> UserProfile {
    UserProfile {
        id: row.get("id"),
        username: row.get("username"),
        display_name: row.get("display_name"),
        is_active: row.get("is_active"),
        coins_sent: row.get("coins_sent"),
        coins_received: row.get("coins_received"),
    }
}

fn wallet_from_row(row: &PgRow) -> Wallet {
    Wallet {
        wallet_id: row.get("wallet_id"),
        user_id: row.get("user_id"),
        owner_name: row.get("owner_name"),
        balance: row.get("balance"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn entry_from_row(row: &PgRow) -> LedgerResult<LedgerEntry> {
    Ok(LedgerEntry {
        id: row.get("transaction_id"),
        wallet_id: row.get("wallet_id"),
        user_id: row.get("user_id"),
        kind: row.get::<String, _>("kind").parse()?,
        amount: row.get("amount"),
        balance_before: row.get("balance_before"),
        balance_after: row.get("balance_after"),
        description: row.get("description"),
        reference_id: row.get("reference_id"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
    })
}

fn content_from_row(row: &PgRow) -> LedgerResult<Content> {
    Ok(Content {
        id: row.get("id"),
        title: row.get("title"),
        kind: row.get::<String, _>("kind").parse()?,
        is_premium: row.get("is_premium"),
        is_active: row.get("is_active"),
        view_count: row.get("view_count"),
        unlock_count: row.get("unlock_count"),
    })
}

fn purchase_from_row(row: &PgRow) -> LedgerResult<PurchaseRequest> {
    Ok(PurchaseRequest {
        id: row.get("id"),
        user_id: row.get("user_id"),
        coin_amount: row.get("coin_amount"),
        paid_amount: row.get("paid_amount"),
        payment_reference: row.get("payment_reference"),
        status: row.get::<String, _>("status").parse()?,
        requested_at: row.get("requested_at"),
        processed_at: row.get("processed_at"),
        admin_note: row.get("admin_note"),
        ledger_entry_id: row.get("ledger_entry_id"),
    })
}

fn transfer_from_row(row: &PgRow) -> LedgerResult<GiftTransfer> {
    let status: String = row.get("status");
    if status != TransferStatus::Completed.as_str() {
        return Err(LedgerError::Storage(format!("unknown transfer status '{status}'")));
    }

    Ok(GiftTransfer {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        sender_name: row.get("sender_name"),
        recipient_id: row.get("recipient_id"),
        recipient_name: row.get("recipient_name"),
        gift_id: row.get("gift_id"),
        gift_name: row.get("gift_name"),
        price: row.get("price"),
        recipient_amount: row.get("recipient_amount"),
        commission: row.get("commission"),
        commission_rate: CommissionRate::from_bps(row.get::<i32, _>("commission_rate_bps") as u32),
        sender_tx_id: row.get("sender_tx_id"),
        recipient_tx_id: row.get("recipient_tx_id"),
        commission_tx_id: row.get("commission_tx_id"),
        message: row.get("message"),
        status: TransferStatus::Completed,
        created_at: row.get("created_at"),
    })
}

fn leaderboard_from_row(row: &PgRow) -> LeaderboardEntry {
    LeaderboardEntry {
        user_id: row.get("user_id"),
        display_name: row.get("display_name"),
        total_coins: row.get("total_coins"),
        gift_count: row.get("gift_count"),
    }
}

async fn fetch_user<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: i64,
) -> LedgerResult<Option<UserProfile>> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
    Ok(row.as_ref().map(user_from_row))
}

async fn fetch_wallet<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: i64,
) -> LedgerResult<Option<Wallet>> {
    let row = sqlx::query(&format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1"))
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
    Ok(row.as_ref().map(wallet_from_row))
}

async fn fetch_unlocked<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: i64,
    content_id: i64,
) -> LedgerResult<bool> {
    let row = sqlx::query("SELECT 1 FROM unlocked_items WHERE user_id = $1 AND content_id = $2")
        .bind(user_id)
        .bind(content_id)
        .fetch_optional(executor)
        .await?;
    Ok(row.is_some())
}

/// Ledger store backed by PostgreSQL
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: Arc<PgPool>,
}

impl PgLedgerStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> LedgerResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn health_check(&self) -> LedgerResult<()> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }

    async fn user(&self, user_id: i64) -> LedgerResult<Option<UserProfile>> {
        fetch_user(self.pool.as_ref(), user_id).await
    }

    async fn wallet(&self, user_id: i64) -> LedgerResult<Option<Wallet>> {
        fetch_wallet(self.pool.as_ref(), user_id).await
    }

    async fn entries(&self, user_id: i64, limit: i64) -> LedgerResult<Vec<LedgerEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM wallet_transactions
             WHERE user_id = $1
             ORDER BY transaction_id DESC
             LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn reconciliation(&self, user_id: i64) -> LedgerResult<Option<Reconciliation>> {
        let row = sqlx::query(
            r#"
            SELECT w.balance,
                   COALESCE((SELECT SUM(t.amount) FROM wallet_transactions t
                             WHERE t.user_id = w.user_id), 0)::BIGINT AS ledger_sum,
                   (SELECT t.balance_after FROM wallet_transactions t
                    WHERE t.user_id = w.user_id
                    ORDER BY t.transaction_id DESC LIMIT 1) AS last_balance_after,
                   (SELECT COUNT(*) FROM wallet_transactions t
                    WHERE t.user_id = w.user_id) AS entry_count
            FROM wallets w
            WHERE w.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|row| Reconciliation {
            user_id,
            balance: row.get("balance"),
            ledger_sum: row.get("ledger_sum"),
            last_balance_after: row.get("last_balance_after"),
            entry_count: row.get("entry_count"),
        }))
    }

    async fn gift_transfer(&self, id: Uuid) -> LedgerResult<Option<GiftTransfer>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM gift_transfers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.as_ref().map(transfer_from_row).transpose()
    }

    async fn content(&self, content_id: i64) -> LedgerResult<Option<Content>> {
        let row = sqlx::query(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_items WHERE id = $1"
        ))
        .bind(content_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.as_ref().map(content_from_row).transpose()
    }

    async fn is_unlocked(&self, user_id: i64, content_id: i64) -> LedgerResult<bool> {
        fetch_unlocked(self.pool.as_ref(), user_id, content_id).await
    }

    async fn purchase_request(&self, request_id: i64) -> LedgerResult<Option<PurchaseRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchase_requests WHERE id = $1"
        ))
        .bind(request_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.as_ref().map(purchase_from_row).transpose()
    }

    async fn purchase_requests(
        &self,
        filter: PurchaseFilter,
        limit: i64,
    ) -> LedgerResult<Vec<PurchaseRequest>> {
        let order = if filter.newest_first {
            "requested_at DESC, id DESC"
        } else {
            "requested_at ASC, id ASC"
        };
        let rows = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchase_requests
             WHERE ($1::VARCHAR IS NULL OR status = $1)
               AND ($2::BIGINT IS NULL OR user_id = $2)
             ORDER BY {order}
             LIMIT $3"
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.user_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(purchase_from_row).collect()
    }

    async fn record_gift_stats(
        &self,
        sender_id: i64,
        recipient_id: i64,
        coins_sent: i64,
        coins_received: i64,
    ) -> LedgerResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET coins_sent = coins_sent + CASE WHEN id = $1 THEN $3 ELSE 0 END,
                coins_received = coins_received + CASE WHEN id = $2 THEN $4 ELSE 0 END
            WHERE id IN ($1, $2)
            "#,
        )
        .bind(sender_id)
        .bind(recipient_id)
        .bind(coins_sent)
        .bind(coins_received)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn top_senders(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> LedgerResult<Vec<LeaderboardEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT sender_id AS user_id,
                   MAX(sender_name) AS display_name,
                   SUM(price)::BIGINT AS total_coins,
                   COUNT(*) AS gift_count
            FROM gift_transfers
            WHERE created_at >= $1
            GROUP BY sender_id
            ORDER BY total_coins DESC, user_id ASC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.iter().map(leaderboard_from_row).collect())
    }

    async fn top_receivers(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> LedgerResult<Vec<LeaderboardEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT recipient_id AS user_id,
                   MAX(recipient_name) AS display_name,
                   SUM(recipient_amount)::BIGINT AS total_coins,
                   COUNT(*) AS gift_count
            FROM gift_transfers
            WHERE created_at >= $1
            GROUP BY recipient_id
            ORDER BY total_coins DESC, user_id ASC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.iter().map(leaderboard_from_row).collect())
    }

    async fn commission_totals(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> LedgerResult<CommissionTotals> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(commission_amount), 0)::BIGINT AS commission,
                   COALESCE(SUM(original_price), 0)::BIGINT AS gross,
                   COUNT(*) AS gift_count
            FROM commission_records
            WHERE ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)
            "#,
        )
        .bind(since)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(CommissionTotals {
            commission: row.get("commission"),
            gross: row.get("gross"),
            gift_count: row.get("gift_count"),
        })
    }

    async fn top_content(&self, limit: i64) -> LedgerResult<Vec<Content>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_items
             WHERE is_premium
             ORDER BY unlock_count DESC, id ASC
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(content_from_row).collect()
    }
}

/// One database transaction. Dropping it without commit rolls back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn user(&mut self, user_id: i64) -> LedgerResult<Option<UserProfile>> {
        fetch_user(&mut *self.tx, user_id).await
    }

    async fn wallet(&mut self, user_id: i64) -> LedgerResult<Option<Wallet>> {
        fetch_wallet(&mut *self.tx, user_id).await
    }

    async fn create_wallet(&mut self, profile: &UserProfile) -> LedgerResult<Wallet> {
        sqlx::query(
            r#"
            INSERT INTO wallets (wallet_id, user_id, owner_name, balance)
            VALUES ($1, $1, $2, 0)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(profile.id)
        .bind(&profile.display_name)
        .execute(&mut *self.tx)
        .await?;

        fetch_wallet(&mut *self.tx, profile.id)
            .await?
            .ok_or(LedgerError::WalletNotFound(profile.id))
    }

    async fn lock_wallets(&mut self, user_ids: &[i64]) -> LedgerResult<()> {
        // Ascending order so concurrent transfers in opposite directions
        // queue instead of deadlocking
        sqlx::query("SELECT user_id FROM wallets WHERE user_id = ANY($1) ORDER BY user_id FOR UPDATE")
            .bind(user_ids)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn debit_balance(&mut self, user_id: i64, amount: i64) -> LedgerResult<Option<i64>> {
        let row = sqlx::query(
            "UPDATE wallets
             SET balance = balance - $1, updated_at = NOW()
             WHERE user_id = $2 AND balance >= $1
             RETURNING balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|row| row.get("balance")))
    }

    async fn credit_balance(&mut self, user_id: i64, amount: i64) -> LedgerResult<Option<i64>> {
        let row = sqlx::query(
            "UPDATE wallets
             SET balance = balance + $1, updated_at = NOW()
             WHERE user_id = $2 AND balance <= 9223372036854775807 - $1
             RETURNING balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|row| row.get("balance")))
    }

    async fn append_entry(&mut self, entry: NewLedgerEntry) -> LedgerResult<LedgerEntry> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallet_transactions
                (wallet_id, user_id, kind, amount, balance_before, balance_after,
                 description, reference_id, metadata)
            VALUES ($1, $1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING transaction_id, created_at
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.kind.as_str())
        .bind(entry.amount)
        .bind(entry.balance_before)
        .bind(entry.balance_after)
        .bind(&entry.description)
        .bind(&entry.reference_id)
        .bind(&entry.metadata)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(LedgerEntry {
            id: row.get("transaction_id"),
            wallet_id: entry.user_id,
            user_id: entry.user_id,
            kind: entry.kind,
            amount: entry.amount,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            description: entry.description,
            reference_id: entry.reference_id,
            metadata: entry.metadata,
            created_at: row.get("created_at"),
        })
    }

    async fn insert_gift_transfer(&mut self, transfer: &GiftTransfer) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO gift_transfers
                (id, sender_id, sender_name, recipient_id, recipient_name, gift_id, gift_name,
                 price, recipient_amount, commission, commission_rate_bps, sender_tx_id,
                 recipient_tx_id, commission_tx_id, message, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(transfer.id)
        .bind(transfer.sender_id)
        .bind(&transfer.sender_name)
        .bind(transfer.recipient_id)
        .bind(&transfer.recipient_name)
        .bind(&transfer.gift_id)
        .bind(&transfer.gift_name)
        .bind(transfer.price)
        .bind(transfer.recipient_amount)
        .bind(transfer.commission)
        .bind(transfer.commission_rate.bps() as i32)
        .bind(transfer.sender_tx_id)
        .bind(transfer.recipient_tx_id)
        .bind(transfer.commission_tx_id)
        .bind(&transfer.message)
        .bind(transfer.status.as_str())
        .bind(transfer.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_commission_record(
        &mut self,
        transfer: &GiftTransfer,
    ) -> LedgerResult<CommissionRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO commission_records
                (gift_transfer_id, commission_amount, original_price, rate_bps, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(transfer.id)
        .bind(transfer.commission)
        .bind(transfer.price)
        .bind(transfer.commission_rate.bps() as i32)
        .bind(transfer.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(CommissionRecord {
            id: row.get("id"),
            gift_transfer_id: transfer.id,
            commission_amount: transfer.commission,
            original_price: transfer.price,
            rate: transfer.commission_rate,
            created_at: transfer.created_at,
        })
    }

    async fn is_unlocked(&mut self, user_id: i64, content_id: i64) -> LedgerResult<bool> {
        fetch_unlocked(&mut *self.tx, user_id, content_id).await
    }

    async fn lock_content(&mut self, content_id: i64) -> LedgerResult<Option<Content>> {
        let row = sqlx::query(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_items WHERE id = $1 FOR UPDATE"
        ))
        .bind(content_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(content_from_row).transpose()
    }

    async fn grant_unlock(
        &mut self,
        user_id: i64,
        content_id: i64,
        cost: i64,
    ) -> LedgerResult<bool> {
        let result = sqlx::query(
            "INSERT INTO unlocked_items (user_id, content_id, cost)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, content_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(content_id)
        .bind(cost)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment_unlock_count(&mut self, content_id: i64) -> LedgerResult<i64> {
        let row = sqlx::query(
            "UPDATE content_items SET unlock_count = unlock_count + 1
             WHERE id = $1
             RETURNING unlock_count",
        )
        .bind(content_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(LedgerError::ContentNotFound(content_id))?;

        Ok(row.get("unlock_count"))
    }

    async fn insert_purchase_request(
        &mut self,
        request: &NewPurchaseRequest,
    ) -> LedgerResult<Option<PurchaseRequest>> {
        let row = sqlx::query(&format!(
            "INSERT INTO purchase_requests (user_id, coin_amount, paid_amount, payment_reference)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (payment_reference) DO NOTHING
             RETURNING {PURCHASE_COLUMNS}"
        ))
        .bind(request.user_id)
        .bind(request.coin_amount)
        .bind(request.paid_amount)
        .bind(&request.payment_reference)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(purchase_from_row).transpose()
    }

    async fn lock_purchase_request(
        &mut self,
        request_id: i64,
    ) -> LedgerResult<Option<PurchaseRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchase_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(request_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(purchase_from_row).transpose()
    }

    async fn resolve_purchase_request(
        &mut self,
        request_id: i64,
        resolution: &PurchaseResolution,
    ) -> LedgerResult<PurchaseRequest> {
        let row = sqlx::query(&format!(
            "UPDATE purchase_requests
             SET status = $2, admin_note = $3, ledger_entry_id = $4, processed_at = $5
             WHERE id = $1
             RETURNING {PURCHASE_COLUMNS}"
        ))
        .bind(request_id)
        .bind(resolution.status.as_str())
        .bind(&resolution.admin_note)
        .bind(resolution.ledger_entry_id)
        .bind(resolution.processed_at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(LedgerError::RequestNotFound(request_id))?;

        purchase_from_row(&row)
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
