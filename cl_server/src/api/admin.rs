//! Operator endpoints. All routes here sit behind
//! [`admin_middleware`](super::middleware::admin_middleware).
//!
//! ```bash
//! curl "http://localhost:8080/api/v1/admin/purchases?status=pending" \
//!   -H "x-admin-token: $ADMIN_TOKEN"
//!
//! curl -X POST http://localhost:8080/api/v1/admin/purchases/12/approve \
//!   -H "x-admin-token: $ADMIN_TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"note": "bank transfer verified"}'
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
};
use coin_ledger::purchase::PurchaseApproval;
use coin_ledger::wallet::{LedgerEntry, Reconciliation};
use coin_ledger::{PurchaseRequest, PurchaseStatus};
use serde::Deserialize;
use std::time::Instant;

use super::AppState;
use super::error::ApiResult;
use super::wallet::DEFAULT_PAGE;
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct PurchaseListQuery {
    pub status: Option<PurchaseStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminCreditBody {
    pub amount: i64,
    #[serde(default)]
    pub note: Option<String>,
}

/// Purchase requests, oldest first, optionally filtered by status.
pub async fn list_purchases(
    State(state): State<AppState>,
    Query(query): Query<PurchaseListQuery>,
) -> ApiResult<Json<Vec<PurchaseRequest>>> {
    let requests = state
        .engine
        .purchases()
        .list_requests(query.status, query.limit.unwrap_or(DEFAULT_PAGE))
        .await?;
    Ok(Json(requests))
}

/// Approve a pending request and credit the buyer.
///
/// The JSON body with an optional `note` may be omitted.
///
/// # Errors
///
/// - `404 Not Found`: Unknown request
/// - `409 Conflict`: Request already approved or rejected
pub async fn approve_purchase(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    body: Option<Json<ResolveBody>>,
) -> ApiResult<Json<PurchaseApproval>> {
    let note = body.and_then(|Json(b)| b.note);
    let approval = state.engine.approve_purchase(request_id, note).await?;

    let request = &approval.request;
    logging::log_ledger_event(
        "purchase_approved",
        request.user_id,
        request.coin_amount,
        &request.payment_reference,
    );
    metrics::purchase_approved(request.coin_amount);

    Ok(Json(approval))
}

/// Reject a pending request. No coins move.
pub async fn reject_purchase(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    body: Option<Json<ResolveBody>>,
) -> ApiResult<Json<PurchaseRequest>> {
    let note = body.and_then(|Json(b)| b.note);
    let request = state.engine.reject_purchase(request_id, note).await?;
    tracing::info!(request_id = request.id, user_id = request.user_id, "Purchase request rejected");
    Ok(Json(request))
}

/// Credit a wallet directly, creating it if needed.
pub async fn credit_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(body): Json<AdminCreditBody>,
) -> ApiResult<Json<LedgerEntry>> {
    let entry = state
        .engine
        .wallets()
        .admin_credit(user_id, body.amount, body.note)
        .await?;

    logging::log_ledger_event("admin_credit", user_id, entry.amount, &entry.id.to_string());
    metrics::admin_credit(entry.amount);

    Ok(Json(entry))
}

/// Compare a wallet's balance with its ledger.
pub async fn reconcile_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Reconciliation>> {
    let started = Instant::now();
    let audit = state.engine.analytics().reconcile_wallet(user_id).await?;
    logging::log_performance(
        "reconcile_wallet",
        started.elapsed().as_millis() as u64,
        Some(user_id),
    );
    Ok(Json(audit))
}
