//! Wallet manager: lazy wallet creation and the credit/debit primitives every
//! other component builds on.

use serde_json::json;
use std::sync::Arc;

use super::models::{EntryKind, LedgerEntry, Posting, Wallet};
use crate::config::EngineConfig;
use crate::db::timeouts::{with_default_timeout, with_timeout};
use crate::errors::{LedgerError, LedgerResult};
use crate::store::{LedgerStore, UnitOfWork};

/// Wallet manager
#[derive(Clone)]
pub struct WalletManager {
    store: Arc<dyn LedgerStore>,
    config: EngineConfig,
}

impl WalletManager {
    /// Create a new wallet manager
    pub fn new(store: Arc<dyn LedgerStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Get the user's wallet, creating it with a zero balance on first use.
    ///
    /// # Errors
    ///
    /// * `LedgerError::UserNotFound` - No active profile for `user_id`
    pub async fn get_or_create_wallet(&self, user_id: i64) -> LedgerResult<Wallet> {
        if let Some(wallet) = with_default_timeout(self.store.wallet(user_id)).await? {
            return Ok(wallet);
        }

        with_timeout(self.config.transaction_timeout, async {
            let mut uow = self.store.begin().await?;
            let wallet = Self::ensure_wallet_in(uow.as_mut(), user_id).await?;
            uow.commit().await?;
            Ok(wallet)
        })
        .await
    }

    /// Credit `amount` coins and record the entry; returns the new balance.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - `amount <= 0`
    /// * `LedgerError::WalletNotFound` - No wallet for `user_id`
    /// * `LedgerError::BalanceOverflow` - Balance would exceed `i64::MAX`
    pub async fn credit(&self, user_id: i64, amount: i64, posting: Posting) -> LedgerResult<i64> {
        with_timeout(self.config.transaction_timeout, async {
            let mut uow = self.store.begin().await?;
            let entry = Self::credit_in(uow.as_mut(), user_id, amount, posting).await?;
            uow.commit().await?;
            Ok(entry.balance_after)
        })
        .await
    }

    /// Debit `amount` coins and record the entry; returns the new balance.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - `amount <= 0`
    /// * `LedgerError::InsufficientFunds` - Balance below `amount`
    /// * `LedgerError::WalletNotFound` - No wallet for `user_id`
    pub async fn debit(&self, user_id: i64, amount: i64, posting: Posting) -> LedgerResult<i64> {
        with_timeout(self.config.transaction_timeout, async {
            let mut uow = self.store.begin().await?;
            let entry = Self::debit_in(uow.as_mut(), user_id, amount, posting).await?;
            uow.commit().await?;
            Ok(entry.balance_after)
        })
        .await
    }

    /// Operator grant. Creates the wallet if needed.
    pub async fn admin_credit(
        &self,
        user_id: i64,
        amount: i64,
        note: Option<String>,
    ) -> LedgerResult<LedgerEntry> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let entry = with_timeout(self.config.transaction_timeout, async {
            let mut uow = self.store.begin().await?;
            Self::ensure_wallet_in(uow.as_mut(), user_id).await?;
            let posting = Posting::new(
                EntryKind::AdminCredit,
                note.clone().unwrap_or_else(|| "Admin credit".to_string()),
            )
            .metadata(json!({ "note": note }));
            let entry = Self::credit_in(uow.as_mut(), user_id, amount, posting).await?;
            uow.commit().await?;
            Ok(entry)
        })
        .await?;

        log::info!(
            "Admin credited {} coins to user {} (balance {})",
            amount,
            user_id,
            entry.balance_after
        );
        Ok(entry)
    }

    /// Get an existing wallet
    pub async fn get_wallet(&self, user_id: i64) -> LedgerResult<Wallet> {
        with_default_timeout(self.store.wallet(user_id))
            .await?
            .ok_or(LedgerError::WalletNotFound(user_id))
    }

    /// Ledger entries for a wallet, newest first.
    ///
    /// `limit` is clamped to `1..=max_ledger_page`.
    pub async fn get_ledger(&self, user_id: i64, limit: i64) -> LedgerResult<Vec<LedgerEntry>> {
        let limit = limit.clamp(1, self.config.max_ledger_page);
        with_default_timeout(self.store.entries(user_id, limit)).await
    }

    /// Return the wallet inside `uow`, creating it if absent.
    pub async fn ensure_wallet_in(uow: &mut dyn UnitOfWork, user_id: i64) -> LedgerResult<Wallet> {
        if let Some(wallet) = uow.wallet(user_id).await? {
            return Ok(wallet);
        }

        let profile = uow
            .user(user_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(LedgerError::UserNotFound(user_id))?;

        let wallet = uow.create_wallet(&profile).await?;
        log::debug!("Created wallet for user {}", user_id);
        Ok(wallet)
    }

    /// Credit inside `uow`.
    pub async fn credit_in(
        uow: &mut dyn UnitOfWork,
        user_id: i64,
        amount: i64,
        posting: Posting,
    ) -> LedgerResult<LedgerEntry> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let new_balance = match uow.credit_balance(user_id, amount).await? {
            Some(balance) => balance,
            None => {
                return Err(match uow.wallet(user_id).await? {
                    Some(_) => LedgerError::BalanceOverflow,
                    None => LedgerError::WalletNotFound(user_id),
                });
            }
        };

        uow.append_entry(posting.into_entry(user_id, amount, new_balance - amount))
            .await
    }

    /// Debit inside `uow`. The balance guard and the decrement are one
    /// statement, so concurrent debits can never overdraw.
    pub async fn debit_in(
        uow: &mut dyn UnitOfWork,
        user_id: i64,
        amount: i64,
        posting: Posting,
    ) -> LedgerResult<LedgerEntry> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let new_balance = match uow.debit_balance(user_id, amount).await? {
            Some(balance) => balance,
            None => {
                return Err(match uow.wallet(user_id).await? {
                    Some(wallet) => LedgerError::InsufficientFunds {
                        user_id,
                        current: wallet.balance,
                        required: amount,
                    },
                    None => LedgerError::WalletNotFound(user_id),
                });
            }
        };

        uow.append_entry(posting.into_entry(user_id, -amount, new_balance + amount))
            .await
    }
}
