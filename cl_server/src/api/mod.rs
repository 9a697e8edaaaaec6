//! HTTP API for the coin ledger.
//!
//! # Modules
//!
//! - [`wallet`]: Balance and ledger history for the caller
//! - [`gifts`]: Gift sending and lookup
//! - [`unlocks`]: Premium content unlocks
//! - [`purchases`]: Purchase request submission
//! - [`admin`]: Purchase approval queue, manual credits, reconciliation
//! - [`analytics`]: Leaderboards, commission and content revenue
//! - [`middleware`]: Caller identity and admin authorization
//!
//! # Endpoints Overview
//!
//! ```text
//! GET  /health                                   - Store health (public)
//! GET  /api/v1/wallet                            - Caller wallet
//! GET  /api/v1/wallet/ledger?limit=              - Caller ledger, newest first
//! POST /api/v1/gifts                             - Send a gift
//! GET  /api/v1/gifts/{id}                        - Gift sent or received by caller
//! POST /api/v1/content/{id}/unlock               - Unlock premium content
//! POST /api/v1/purchases                         - Submit a purchase request
//! GET  /api/v1/purchases/mine                    - Caller purchase requests
//! GET  /api/v1/admin/purchases?status=&limit=    - Approval queue (admin)
//! POST /api/v1/admin/purchases/{id}/approve      - Approve and credit (admin)
//! POST /api/v1/admin/purchases/{id}/reject       - Reject (admin)
//! POST /api/v1/admin/wallets/{user_id}/credit    - Manual credit (admin)
//! GET  /api/v1/admin/wallets/{user_id}/reconcile - Ledger audit (admin)
//! GET  /api/v1/analytics/leaderboard             - Cached leaderboards
//! GET  /api/v1/analytics/commission              - Commission summary
//! GET  /api/v1/analytics/content/{id}            - Content revenue
//! ```
//!
//! Caller identity comes from the `x-user-id` header; admin routes also need
//! `x-admin-token`.
//!
//! # CORS
//!
//! CORS is permissive; restrict origins at the gateway in production.

pub mod admin;
pub mod analytics;
pub mod error;
pub mod gifts;
pub mod middleware;
pub mod purchases;
pub mod request_id;
pub mod unlocks;
pub mod wallet;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use coin_ledger::CoinEngine;
use coin_ledger::analytics::LeaderboardCache;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all handlers.
///
/// Cloned per request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CoinEngine>,
    pub leaderboard: Arc<LeaderboardCache>,
    pub admin_token: Arc<str>,
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Example
///
/// ```rust,no_run
/// # use cl_server::api::{create_router, AppState};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let state: AppState = unimplemented!();
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/purchases", get(admin::list_purchases))
        .route("/purchases/{id}/approve", post(admin::approve_purchase))
        .route("/purchases/{id}/reject", post(admin::reject_purchase))
        .route("/wallets/{user_id}/credit", post(admin::credit_wallet))
        .route("/wallets/{user_id}/reconcile", get(admin::reconcile_wallet))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::admin_middleware,
        ));

    let v1_routes = Router::new()
        .route("/wallet", get(wallet::get_wallet))
        .route("/wallet/ledger", get(wallet::get_ledger))
        .route("/gifts", post(gifts::send_gift))
        .route("/gifts/{id}", get(gifts::get_gift))
        .route("/content/{id}/unlock", post(unlocks::unlock_content))
        .route("/purchases", post(purchases::create_purchase))
        .route("/purchases/mine", get(purchases::my_purchases))
        .route("/analytics/leaderboard", get(analytics::leaderboard))
        .route("/analytics/commission", get(analytics::commission))
        .route("/analytics/content/{id}", get(analytics::content_revenue))
        .nest("/admin", admin_routes);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.health_check().await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE")
        }
    }
}
