//! Gift API handler.
//!
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/gifts \
//!   -H "x-user-id: 7" \
//!   -H "Content-Type: application/json" \
//!   -d '{"recipient_id": 9, "gift_id": "rose", "gift_name": "Rose", "price": 100}'
//!
//! curl http://localhost:8080/api/v1/gifts/0b8f6c1e-5d0a-4c47-9b43-6a1f3a8e2d11 \
//!   -H "x-user-id: 7"
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use coin_ledger::gift::GiftTransfer;
use coin_ledger::{GiftReceipt, SendGiftRequest};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use super::error::{ApiError, ApiResult};
use super::middleware::Caller;
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct SendGiftBody {
    pub recipient_id: i64,
    pub gift_id: String,
    pub gift_name: String,
    pub price: i64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Send a gift from the caller.
///
/// # Errors
///
/// - `400 Bad Request`: Non-positive price or gift to self
/// - `402 Payment Required`: Caller balance below the price
/// - `404 Not Found`: Sender or recipient unknown or inactive
/// - `503 Service Unavailable`: Ledger busy, retry
pub async fn send_gift(
    State(state): State<AppState>,
    Caller(sender_id): Caller,
    Json(body): Json<SendGiftBody>,
) -> ApiResult<Json<GiftReceipt>> {
    let receipt = state
        .engine
        .send_gift(SendGiftRequest {
            sender_id,
            recipient_id: body.recipient_id,
            gift_id: body.gift_id,
            gift_name: body.gift_name,
            price: body.price,
            message: body.message,
        })
        .await?;

    let transfer = &receipt.transfer;
    logging::log_ledger_event("gift", sender_id, transfer.price, &transfer.id.to_string());
    metrics::gift_sent(transfer.price, transfer.commission);

    Ok(Json(receipt))
}

/// Look up a gift the caller sent or received.
///
/// # Errors
///
/// - `400 Bad Request`: Id is not a UUID
/// - `404 Not Found`: No such gift, or the caller is not a party to it
pub async fn get_gift(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<GiftTransfer>> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::bad_request("Invalid gift id"))?;

    state
        .engine
        .gifts()
        .get_transfer(id)
        .await?
        .filter(|t| t.sender_id == user_id || t.recipient_id == user_id)
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "gift_not_found", "Gift not found"))
}
