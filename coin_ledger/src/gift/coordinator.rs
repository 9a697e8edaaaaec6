//! Gift sending: sender debit, recipient credit and commission as one unit.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::commission::GiftSplit;
use super::models::{GiftReceipt, GiftTransfer, SendGiftRequest, TransferStatus};
use crate::config::EngineConfig;
use crate::db::timeouts::{with_default_timeout, with_timeout};
use crate::errors::{LedgerError, LedgerResult};
use crate::store::LedgerStore;
use crate::wallet::{EntryKind, Posting, WalletManager};

/// Transfer coordinator
#[derive(Clone)]
pub struct TransferCoordinator {
    store: Arc<dyn LedgerStore>,
    config: EngineConfig,
}

impl TransferCoordinator {
    pub fn new(store: Arc<dyn LedgerStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Send a gift.
    ///
    /// The sender pays the full price; the recipient receives the price minus
    /// commission. When a platform wallet is configured it is credited the
    /// commission, so the three legs sum to zero.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - `price <= 0`
    /// * `LedgerError::SelfTransferDenied` - Sender and recipient are the same user
    /// * `LedgerError::SenderNotFound` / `LedgerError::RecipientNotFound`
    /// * `LedgerError::InsufficientFunds` - Sender balance below the price
    /// * `LedgerError::Timeout` - Unit exceeded its budget; nothing applied
    pub async fn send_gift(&self, request: SendGiftRequest) -> LedgerResult<GiftReceipt> {
        let split = self.config.commission_rate.split(request.price)?;
        if request.sender_id == request.recipient_id {
            return Err(LedgerError::SelfTransferDenied);
        }

        let receipt = with_timeout(
            self.config.transaction_timeout,
            self.transfer(&request, split),
        )
        .await?;

        log::info!(
            "Gift {} sent: {} -> {}, price {}, commission {}",
            receipt.transfer.id,
            receipt.transfer.sender_id,
            receipt.transfer.recipient_id,
            receipt.transfer.price,
            receipt.transfer.commission
        );

        self.record_stats(&receipt.transfer).await;
        Ok(receipt)
    }

    /// Look up a completed transfer
    pub async fn get_transfer(&self, id: Uuid) -> LedgerResult<Option<GiftTransfer>> {
        with_default_timeout(self.store.gift_transfer(id)).await
    }

    async fn transfer(&self, request: &SendGiftRequest, split: GiftSplit) -> LedgerResult<GiftReceipt> {
        let mut uow = self.store.begin().await?;

        let sender = uow
            .user(request.sender_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(LedgerError::SenderNotFound(request.sender_id))?;
        let recipient = uow
            .user(request.recipient_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(LedgerError::RecipientNotFound(request.recipient_id))?;

        WalletManager::ensure_wallet_in(uow.as_mut(), sender.id).await?;
        WalletManager::ensure_wallet_in(uow.as_mut(), recipient.id).await?;

        let platform_wallet = self
            .config
            .platform_wallet_user_id
            .filter(|_| split.commission > 0);
        if let Some(platform_id) = platform_wallet {
            WalletManager::ensure_wallet_in(uow.as_mut(), platform_id).await?;
        }

        let mut locked: Vec<i64> = [Some(sender.id), Some(recipient.id), platform_wallet]
            .into_iter()
            .flatten()
            .collect();
        locked.sort_unstable();
        locked.dedup();
        uow.lock_wallets(&locked).await?;

        let transfer_id = Uuid::new_v4();
        let metadata = json!({
            "transfer_id": transfer_id,
            "gift_id": request.gift_id,
            "gift_name": request.gift_name,
            "price": split.price,
            "commission": split.commission,
        });

        let sender_entry = WalletManager::debit_in(
            uow.as_mut(),
            sender.id,
            split.price,
            Posting::new(
                EntryKind::GiftSent,
                format!("Sent {} to {}", request.gift_name, recipient.display_name),
            )
            .reference(transfer_id)
            .metadata(metadata.clone()),
        )
        .await?;

        let recipient_entry = WalletManager::credit_in(
            uow.as_mut(),
            recipient.id,
            split.recipient_amount,
            Posting::new(
                EntryKind::GiftReceived,
                format!("Received {} from {}", request.gift_name, sender.display_name),
            )
            .reference(transfer_id)
            .metadata(metadata.clone()),
        )
        .await?;

        let commission_entry = match platform_wallet {
            Some(platform_id) => Some(
                WalletManager::credit_in(
                    uow.as_mut(),
                    platform_id,
                    split.commission,
                    Posting::new(
                        EntryKind::Commission,
                        format!("Commission on {}", request.gift_name),
                    )
                    .reference(transfer_id)
                    .metadata(metadata),
                )
                .await?,
            ),
            None => None,
        };

        let transfer = GiftTransfer {
            id: transfer_id,
            sender_id: sender.id,
            sender_name: sender.display_name,
            recipient_id: recipient.id,
            recipient_name: recipient.display_name,
            gift_id: request.gift_id.clone(),
            gift_name: request.gift_name.clone(),
            price: split.price,
            recipient_amount: split.recipient_amount,
            commission: split.commission,
            commission_rate: split.rate,
            sender_tx_id: sender_entry.id,
            recipient_tx_id: recipient_entry.id,
            commission_tx_id: commission_entry.map(|e| e.id),
            message: request.message.clone(),
            status: TransferStatus::Completed,
            created_at: Utc::now(),
        };

        uow.insert_gift_transfer(&transfer).await?;
        let commission = uow.insert_commission_record(&transfer).await?;
        uow.commit().await?;

        Ok(GiftReceipt {
            transfer,
            commission,
            sender_balance: sender_entry.balance_after,
            recipient_balance: recipient_entry.balance_after,
        })
    }

    async fn record_stats(&self, transfer: &GiftTransfer) {
        let result = with_default_timeout(self.store.record_gift_stats(
            transfer.sender_id,
            transfer.recipient_id,
            transfer.price,
            transfer.recipient_amount,
        ))
        .await;

        if let Err(e) = result {
            log::warn!("Failed to update gift stats for transfer {}: {}", transfer.id, e);
        }
    }
}
