//! One-time paid unlocks of premium content.

use serde_json::json;
use std::sync::Arc;

use super::models::{Content, UnlockOutcome};
use crate::config::EngineConfig;
use crate::db::timeouts::{with_default_timeout, with_timeout};
use crate::errors::{LedgerError, LedgerResult};
use crate::store::{LedgerStore, UnitOfWork};
use crate::wallet::{EntryKind, Posting, WalletManager};

/// Unlock coordinator
#[derive(Clone)]
pub struct UnlockCoordinator {
    store: Arc<dyn LedgerStore>,
    config: EngineConfig,
}

impl UnlockCoordinator {
    pub fn new(store: Arc<dyn LedgerStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Unlock `content_id` for `user_id`, charging the class price once.
    ///
    /// A user who already owns the item gets [`UnlockOutcome::AlreadyUnlocked`]
    /// and is not charged, including when a concurrent request won the race.
    ///
    /// # Errors
    ///
    /// * `LedgerError::UserNotFound` - No active profile
    /// * `LedgerError::ContentNotFound` - Content missing or inactive
    /// * `LedgerError::ContentNotPremium` - Content is free
    /// * `LedgerError::InsufficientFunds` - Balance below the unlock price
    pub async fn unlock_content(&self, user_id: i64, content_id: i64) -> LedgerResult<UnlockOutcome> {
        let outcome = with_timeout(
            self.config.transaction_timeout,
            self.unlock(user_id, content_id),
        )
        .await?;

        match &outcome {
            UnlockOutcome::Unlocked {
                balance,
                unlock_count,
                ..
            } => log::info!(
                "User {} unlocked content {} (balance {}, unlocks {})",
                user_id,
                content_id,
                balance,
                unlock_count
            ),
            UnlockOutcome::AlreadyUnlocked { .. } => log::debug!(
                "User {} already owns content {}",
                user_id,
                content_id
            ),
        }

        Ok(outcome)
    }

    /// Whether the user owns `content_id`
    pub async fn is_unlocked(&self, user_id: i64, content_id: i64) -> LedgerResult<bool> {
        with_default_timeout(self.store.is_unlocked(user_id, content_id)).await
    }

    /// Price the user would pay for `content`.
    pub fn cost_for(&self, content: &Content) -> i64 {
        self.config.unlock_pricing.cost_for(content.kind)
    }

    async fn unlock(&self, user_id: i64, content_id: i64) -> LedgerResult<UnlockOutcome> {
        let mut uow = self.store.begin().await?;

        uow.user(user_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(LedgerError::UserNotFound(user_id))?;

        if uow.is_unlocked(user_id, content_id).await? {
            return already_unlocked(uow.as_mut(), user_id).await;
        }

        let content = uow
            .lock_content(content_id)
            .await?
            .filter(|c| c.is_active)
            .ok_or(LedgerError::ContentNotFound(content_id))?;
        if !content.is_premium {
            return Err(LedgerError::ContentNotPremium(content_id));
        }

        let cost = self.cost_for(&content);
        WalletManager::ensure_wallet_in(uow.as_mut(), user_id).await?;
        let entry = WalletManager::debit_in(
            uow.as_mut(),
            user_id,
            cost,
            Posting::new(EntryKind::Unlock, format!("Unlocked {}", content.title))
                .reference(content_id)
                .metadata(json!({
                    "content_id": content_id,
                    "content_kind": content.kind,
                    "cost": cost,
                })),
        )
        .await?;

        if !uow.grant_unlock(user_id, content_id, cost).await? {
            // Lost the race; dropping the unit refunds the debit
            drop(uow);
            let balance = with_default_timeout(self.store.wallet(user_id))
                .await?
                .map(|w| w.balance)
                .unwrap_or(0);
            return Ok(UnlockOutcome::AlreadyUnlocked { balance });
        }

        let unlock_count = uow.increment_unlock_count(content_id).await?;
        uow.commit().await?;

        Ok(UnlockOutcome::Unlocked {
            balance: entry.balance_after,
            entry_id: entry.id,
            unlock_count,
        })
    }
}

async fn already_unlocked(uow: &mut dyn UnitOfWork, user_id: i64) -> LedgerResult<UnlockOutcome> {
    let balance = uow.wallet(user_id).await?.map(|w| w.balance).unwrap_or(0);
    Ok(UnlockOutcome::AlreadyUnlocked { balance })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLedgerStore;
    use crate::unlock::ContentKind;
    use crate::wallet::UserProfile;

    async fn setup() -> (MemoryLedgerStore, UnlockCoordinator, WalletManager) {
        let store = MemoryLedgerStore::new();
        store.insert_user(UserProfile::new(1, "alice", "Alice")).await;
        store
            .insert_content(Content::premium(10, "Moonlit Vows", ContentKind::Drama))
            .await;
        store
            .insert_content(Content::premium(11, "Moonlit Vows E1", ContentKind::Episode))
            .await;

        let shared: Arc<dyn LedgerStore> = Arc::new(store.clone());
        let config = EngineConfig::default();
        (
            store,
            UnlockCoordinator::new(shared.clone(), config.clone()),
            WalletManager::new(shared, config),
        )
    }

    #[tokio::test]
    async fn test_unlock_charges_class_price() {
        let (store, unlocks, wallets) = setup().await;
        wallets.admin_credit(1, 200, None).await.unwrap();

        let outcome = unlocks.unlock_content(1, 11).await.unwrap();

        assert!(outcome.unlocked());
        assert_eq!(outcome.balance(), 190);
        assert_eq!(store.content(11).await.unwrap().unwrap().unlock_count, 1);
    }

    #[tokio::test]
    async fn test_free_content_rejected() {
        let (store, unlocks, wallets) = setup().await;
        wallets.admin_credit(1, 200, None).await.unwrap();
        let mut free = Content::premium(12, "Trailer", ContentKind::Episode);
        free.is_premium = false;
        store.insert_content(free).await;

        let err = unlocks.unlock_content(1, 12).await.unwrap_err();
        assert!(matches!(err, LedgerError::ContentNotPremium(12)));
    }

    #[tokio::test]
    async fn test_inactive_content_not_found() {
        let (store, unlocks, wallets) = setup().await;
        wallets.admin_credit(1, 200, None).await.unwrap();
        let mut hidden = Content::premium(13, "Pulled", ContentKind::Drama);
        hidden.is_active = false;
        store.insert_content(hidden).await;

        let err = unlocks.unlock_content(1, 13).await.unwrap_err();
        assert!(matches!(err, LedgerError::ContentNotFound(13)));
        let err = unlocks.unlock_content(1, 404).await.unwrap_err();
        assert!(matches!(err, LedgerError::ContentNotFound(404)));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (_store, unlocks, _wallets) = setup().await;
        let err = unlocks.unlock_content(7, 10).await.unwrap_err();
        assert!(matches!(err, LedgerError::UserNotFound(7)));
    }

    #[tokio::test]
    async fn test_no_wallet_is_insufficient() {
        let (_store, unlocks, _wallets) = setup().await;

        let err = unlocks.unlock_content(1, 10).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                current: 0,
                required: 99,
                ..
            }
        ));
        assert!(!unlocks.is_unlocked(1, 10).await.unwrap());
    }
}
