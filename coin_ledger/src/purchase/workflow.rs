//! Purchase approval workflow: `pending -> approved | rejected`.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use super::models::{
    NewPurchaseRequest, PurchaseApproval, PurchaseRequest, PurchaseResolution, PurchaseStatus,
};
use crate::config::EngineConfig;
use crate::db::timeouts::{with_default_timeout, with_timeout};
use crate::errors::{LedgerError, LedgerResult};
use crate::store::{LedgerStore, PurchaseFilter, UnitOfWork};
use crate::wallet::{EntryKind, Posting, WalletManager};

/// Purchase workflow
#[derive(Clone)]
pub struct PurchaseWorkflow {
    store: Arc<dyn LedgerStore>,
    config: EngineConfig,
}

impl PurchaseWorkflow {
    pub fn new(store: Arc<dyn LedgerStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Submit an externally-paid purchase for operator review.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Coin or paid amount not positive
    /// * `LedgerError::UserNotFound` - No active profile
    /// * `LedgerError::DuplicatePaymentReference` - Reference already submitted
    pub async fn create_request(&self, request: NewPurchaseRequest) -> LedgerResult<PurchaseRequest> {
        if request.coin_amount <= 0 {
            return Err(LedgerError::InvalidAmount(request.coin_amount));
        }
        if request.paid_amount <= 0 {
            return Err(LedgerError::InvalidAmount(request.paid_amount));
        }

        let created = with_timeout(self.config.transaction_timeout, async {
            let mut uow = self.store.begin().await?;
            uow.user(request.user_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or(LedgerError::UserNotFound(request.user_id))?;

            let created = uow
                .insert_purchase_request(&request)
                .await?
                .ok_or_else(|| {
                    LedgerError::DuplicatePaymentReference(request.payment_reference.clone())
                })?;
            uow.commit().await?;
            Ok(created)
        })
        .await?;

        log::info!(
            "Purchase request {} created: user {} wants {} coins",
            created.id,
            created.user_id,
            created.coin_amount
        );
        Ok(created)
    }

    /// Approve a pending request and credit the coins.
    ///
    /// # Errors
    ///
    /// * `LedgerError::RequestNotFound`
    /// * `LedgerError::AlreadyProcessed` - Request is no longer pending
    pub async fn approve(&self, request_id: i64, note: Option<String>) -> LedgerResult<PurchaseApproval> {
        let approval = with_timeout(self.config.transaction_timeout, async {
            let mut uow = self.store.begin().await?;
            let request = lock_pending(uow.as_mut(), request_id).await?;

            WalletManager::ensure_wallet_in(uow.as_mut(), request.user_id).await?;
            let entry = WalletManager::credit_in(
                uow.as_mut(),
                request.user_id,
                request.coin_amount,
                Posting::new(
                    EntryKind::Purchase,
                    format!("Purchased {} coins", request.coin_amount),
                )
                .reference(request.id)
                .metadata(json!({
                    "purchase_request_id": request.id,
                    "payment_reference": request.payment_reference,
                    "paid_amount": request.paid_amount,
                })),
            )
            .await?;

            let resolution = PurchaseResolution {
                status: PurchaseStatus::Approved,
                admin_note: note,
                ledger_entry_id: Some(entry.id),
                processed_at: Utc::now(),
            };
            let request = uow.resolve_purchase_request(request_id, &resolution).await?;
            uow.commit().await?;

            Ok(PurchaseApproval {
                request,
                new_balance: entry.balance_after,
            })
        })
        .await?;

        log::info!(
            "Purchase request {} approved: {} coins to user {}",
            request_id,
            approval.request.coin_amount,
            approval.request.user_id
        );
        Ok(approval)
    }

    /// Reject a pending request. No balance effect.
    pub async fn reject(&self, request_id: i64, note: Option<String>) -> LedgerResult<PurchaseRequest> {
        let request = with_timeout(self.config.transaction_timeout, async {
            let mut uow = self.store.begin().await?;
            lock_pending(uow.as_mut(), request_id).await?;

            let resolution = PurchaseResolution {
                status: PurchaseStatus::Rejected,
                admin_note: note,
                ledger_entry_id: None,
                processed_at: Utc::now(),
            };
            let request = uow.resolve_purchase_request(request_id, &resolution).await?;
            uow.commit().await?;
            Ok(request)
        })
        .await?;

        log::info!("Purchase request {} rejected", request_id);
        Ok(request)
    }

    pub async fn get_request(&self, request_id: i64) -> LedgerResult<PurchaseRequest> {
        with_default_timeout(self.store.purchase_request(request_id))
            .await?
            .ok_or(LedgerError::RequestNotFound(request_id))
    }

    /// Requests in submission order, optionally filtered by status
    pub async fn list_requests(
        &self,
        status: Option<PurchaseStatus>,
        limit: i64,
    ) -> LedgerResult<Vec<PurchaseRequest>> {
        let filter = PurchaseFilter {
            status,
            user_id: None,
            newest_first: false,
        };
        let limit = limit.clamp(1, self.config.max_ledger_page);
        with_default_timeout(self.store.purchase_requests(filter, limit)).await
    }

    /// A user's own requests, newest first
    pub async fn list_user_requests(&self, user_id: i64, limit: i64) -> LedgerResult<Vec<PurchaseRequest>> {
        let filter = PurchaseFilter {
            status: None,
            user_id: Some(user_id),
            newest_first: true,
        };
        let limit = limit.clamp(1, self.config.max_ledger_page);
        with_default_timeout(self.store.purchase_requests(filter, limit)).await
    }
}

async fn lock_pending(uow: &mut dyn UnitOfWork, request_id: i64) -> LedgerResult<PurchaseRequest> {
    let request = uow
        .lock_purchase_request(request_id)
        .await?
        .ok_or(LedgerError::RequestNotFound(request_id))?;

    if request.status.is_terminal() {
        return Err(LedgerError::AlreadyProcessed {
            request_id,
            status: request.status,
        });
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLedgerStore;
    use crate::wallet::UserProfile;

    async fn setup() -> (MemoryLedgerStore, PurchaseWorkflow) {
        let store = MemoryLedgerStore::new();
        store.insert_user(UserProfile::new(1, "alice", "Alice")).await;
        let workflow = PurchaseWorkflow::new(Arc::new(store.clone()), EngineConfig::default());
        (store, workflow)
    }

    fn order(reference: &str) -> NewPurchaseRequest {
        NewPurchaseRequest {
            user_id: 1,
            coin_amount: 500,
            paid_amount: 499,
            payment_reference: reference.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_is_pending() {
        let (_store, workflow) = setup().await;
        let request = workflow.create_request(order("pay_1")).await.unwrap();

        assert_eq!(request.status, PurchaseStatus::Pending);
        assert!(request.processed_at.is_none());
        assert_eq!(workflow.get_request(request.id).await.unwrap(), request);
    }

    #[tokio::test]
    async fn test_create_validates_amounts() {
        let (_store, workflow) = setup().await;
        let mut bad = order("pay_1");
        bad.coin_amount = 0;
        assert!(matches!(
            workflow.create_request(bad).await.unwrap_err(),
            LedgerError::InvalidAmount(0)
        ));

        let mut bad = order("pay_2");
        bad.paid_amount = -1;
        assert!(matches!(
            workflow.create_request(bad).await.unwrap_err(),
            LedgerError::InvalidAmount(-1)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_reference() {
        let (_store, workflow) = setup().await;
        workflow.create_request(order("pay_1")).await.unwrap();

        let err = workflow.create_request(order("pay_1")).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicatePaymentReference(r) if r == "pay_1"));
    }

    #[tokio::test]
    async fn test_reject_has_no_balance_effect() {
        let (store, workflow) = setup().await;
        let request = workflow.create_request(order("pay_1")).await.unwrap();

        let rejected = workflow
            .reject(request.id, Some("payment bounced".into()))
            .await
            .unwrap();

        assert_eq!(rejected.status, PurchaseStatus::Rejected);
        assert_eq!(rejected.admin_note.as_deref(), Some("payment bounced"));
        assert!(store.wallet(1).await.unwrap().is_none());

        let err = workflow.approve(request.id, None).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::AlreadyProcessed {
                status: PurchaseStatus::Rejected,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (_store, workflow) = setup().await;
        let first = workflow.create_request(order("pay_1")).await.unwrap();
        workflow.create_request(order("pay_2")).await.unwrap();
        workflow.approve(first.id, None).await.unwrap();

        let pending = workflow
            .list_requests(Some(PurchaseStatus::Pending), 50)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payment_reference, "pay_2");

        let mine = workflow.list_user_requests(1, 50).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].payment_reference, "pay_2");
        assert_eq!(mine[1].id, first.id);
    }

    #[tokio::test]
    async fn test_user_page_keeps_latest_requests() {
        let (_store, workflow) = setup().await;
        let mut ids = Vec::new();
        for i in 1..=60 {
            let request = workflow
                .create_request(order(&format!("pay_{i}")))
                .await
                .unwrap();
            ids.push(request.id);
        }

        let page = workflow.list_user_requests(1, 50).await.unwrap();
        assert_eq!(page.len(), 50);
        assert_eq!(page[0].id, ids[59]);
        assert_eq!(page[49].id, ids[10]);
        assert_eq!(page[0].status, PurchaseStatus::Pending);

        let queue = workflow
            .list_requests(Some(PurchaseStatus::Pending), 50)
            .await
            .unwrap();
        assert_eq!(queue[0].id, ids[0]);
    }
}
