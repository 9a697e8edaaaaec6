//! Purchase request API handlers for end users.
//!
//! Users declare an external payment; an operator later approves or rejects it
//! through the admin routes.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use coin_ledger::PurchaseRequest;
use serde::Deserialize;

use super::AppState;
use super::error::ApiResult;
use super::middleware::Caller;
use super::wallet::PageQuery;

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseBody {
    pub coin_amount: i64,
    pub paid_amount: i64,
    pub payment_reference: String,
}

/// Submit a purchase request for the caller.
///
/// # Errors
///
/// - `400 Bad Request`: Non-positive coin or paid amount
/// - `409 Conflict`: Payment reference already submitted
pub async fn create_purchase(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(body): Json<CreatePurchaseBody>,
) -> ApiResult<(StatusCode, Json<PurchaseRequest>)> {
    let request = state
        .engine
        .create_purchase_request(
            user_id,
            body.coin_amount,
            body.paid_amount,
            body.payment_reference,
        )
        .await?;

    tracing::info!(
        request_id = request.id,
        user_id = user_id,
        coin_amount = request.coin_amount,
        "Purchase request submitted"
    );

    Ok((StatusCode::CREATED, Json(request)))
}

/// The caller's purchase requests, newest first.
pub async fn my_purchases(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<PurchaseRequest>>> {
    let requests = state
        .engine
        .purchases()
        .list_user_requests(user_id, page.limit())
        .await?;
    Ok(Json(requests))
}
