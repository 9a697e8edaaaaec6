//! Caller identity and admin authorization.
//!
//! Authentication happens upstream: the identity gateway strips any inbound
//! `x-user-id` and sets it for authenticated sessions. This service trusts the
//! header and only checks that it is a well-formed user id.
//!
//! Admin routes additionally require `x-admin-token` to match the configured
//! secret.
//!
//! ```rust,no_run
//! use axum::{Router, routing::get, middleware};
//! # use cl_server::api::middleware::admin_middleware;
//! # use cl_server::api::AppState;
//! # async fn handler() {}
//! # let state: AppState = unimplemented!();
//!
//! let admin_routes: Router<AppState> = Router::new()
//!     .route("/admin/purchases", get(handler))
//!     .layer(middleware::from_fn_with_state(state, admin_middleware));
//! # let _ = admin_routes;
//! ```

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use super::AppState;
use super::error::ApiError;
use crate::logging;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the admin secret
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Parse the caller id, if any, from request headers.
pub fn caller_id(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
}

/// Authenticated caller extracted from `x-user-id`.
///
/// ```rust,no_run
/// use cl_server::api::middleware::Caller;
///
/// async fn whoami(Caller(user_id): Caller) -> String {
///     format!("user {}", user_id)
/// }
/// # let _ = whoami;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub i64);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_id(&parts.headers)
            .map(Caller)
            .ok_or_else(|| ApiError::unauthorized("Missing or invalid x-user-id header"))
    }
}

/// Reject requests whose `x-admin-token` does not match the configured token.
///
/// The comparison runs in constant time over the token bytes.
pub async fn admin_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .map(|value| value.as_bytes());

    let authorized = match presented {
        Some(token) => bool::from(token.ct_eq(state.admin_token.as_bytes())),
        None => false,
    };

    if !authorized {
        logging::log_security_event(
            "admin_denied",
            caller_id(request.headers()),
            &format!("Rejected admin request to {}", request.uri().path()),
        );
        return Err(ApiError::unauthorized("Admin token required"));
    }

    Ok(next.run(request).await)
}
