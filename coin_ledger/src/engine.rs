//! Engine facade bundling the ledger components over one store.

use std::sync::Arc;

use crate::analytics::AnalyticsReader;
use crate::config::EngineConfig;
use crate::errors::LedgerResult;
use crate::gift::{GiftReceipt, SendGiftRequest, TransferCoordinator};
use crate::purchase::{NewPurchaseRequest, PurchaseApproval, PurchaseRequest, PurchaseWorkflow};
use crate::store::LedgerStore;
use crate::unlock::{UnlockCoordinator, UnlockOutcome};
use crate::wallet::{LedgerEntry, Wallet, WalletManager};

/// Coin engine.
///
/// Cheap to clone; every component shares the same store.
#[derive(Clone)]
pub struct CoinEngine {
    store: Arc<dyn LedgerStore>,
    config: EngineConfig,
    wallets: WalletManager,
    gifts: TransferCoordinator,
    unlocks: UnlockCoordinator,
    purchases: PurchaseWorkflow,
    analytics: AnalyticsReader,
}

impl CoinEngine {
    pub fn new(store: Arc<dyn LedgerStore>, config: EngineConfig) -> Self {
        Self {
            wallets: WalletManager::new(store.clone(), config.clone()),
            gifts: TransferCoordinator::new(store.clone(), config.clone()),
            unlocks: UnlockCoordinator::new(store.clone(), config.clone()),
            purchases: PurchaseWorkflow::new(store.clone(), config.clone()),
            analytics: AnalyticsReader::new(store.clone(), config.clone()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn wallets(&self) -> &WalletManager {
        &self.wallets
    }

    pub fn gifts(&self) -> &TransferCoordinator {
        &self.gifts
    }

    pub fn unlocks(&self) -> &UnlockCoordinator {
        &self.unlocks
    }

    pub fn purchases(&self) -> &PurchaseWorkflow {
        &self.purchases
    }

    pub fn analytics(&self) -> &AnalyticsReader {
        &self.analytics
    }

    pub async fn health_check(&self) -> LedgerResult<()> {
        self.store.health_check().await
    }

    /// Send a gift (see [`TransferCoordinator::send_gift`])
    pub async fn send_gift(&self, request: SendGiftRequest) -> LedgerResult<GiftReceipt> {
        self.gifts.send_gift(request).await
    }

    /// Unlock premium content (see [`UnlockCoordinator::unlock_content`])
    pub async fn unlock_content(&self, user_id: i64, content_id: i64) -> LedgerResult<UnlockOutcome> {
        self.unlocks.unlock_content(user_id, content_id).await
    }

    pub async fn create_purchase_request(
        &self,
        user_id: i64,
        coin_amount: i64,
        paid_amount: i64,
        payment_reference: impl Into<String>,
    ) -> LedgerResult<PurchaseRequest> {
        self.purchases
            .create_request(NewPurchaseRequest {
                user_id,
                coin_amount,
                paid_amount,
                payment_reference: payment_reference.into(),
            })
            .await
    }

    pub async fn approve_purchase(
        &self,
        request_id: i64,
        note: Option<String>,
    ) -> LedgerResult<PurchaseApproval> {
        self.purchases.approve(request_id, note).await
    }

    pub async fn reject_purchase(
        &self,
        request_id: i64,
        note: Option<String>,
    ) -> LedgerResult<PurchaseRequest> {
        self.purchases.reject(request_id, note).await
    }

    /// The caller's wallet, created with a zero balance on first access.
    pub async fn get_wallet(&self, user_id: i64) -> LedgerResult<Wallet> {
        self.wallets.get_or_create_wallet(user_id).await
    }

    /// Newest entries first
    pub async fn get_ledger(&self, user_id: i64, limit: i64) -> LedgerResult<Vec<LedgerEntry>> {
        self.wallets.get_ledger(user_id, limit).await
    }
}
