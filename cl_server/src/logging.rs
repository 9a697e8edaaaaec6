//! Structured logging configuration.
//!
//! Console output with targets, thread ids and source locations, plus helpers
//! that keep field names consistent across handlers.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Requests slower than this are logged at warn
const SLOW_REQUEST_MS: u64 = 1000;

/// Initialize structured logging
///
/// Levels come from `RUST_LOG`, defaulting to `info` with sqlx and hyper
/// quietened.
///
/// # Example
///
/// ```no_run
/// use cl_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a rejected privileged request
///
/// # Example
///
/// ```
/// use cl_server::logging::log_security_event;
///
/// log_security_event("admin_denied", Some(123), "Bad admin token");
/// ```
pub fn log_security_event(event_type: &str, user_id: Option<i64>, message: &str) {
    tracing::warn!(
        event_type = event_type,
        user_id = user_id,
        "SECURITY: {}",
        message
    );
}

/// Log a committed balance movement
///
/// # Arguments
///
/// * `event_type` - `gift`, `unlock`, `purchase_approved`, `admin_credit`...
/// * `user_id` - The wallet owner acting or being credited
/// * `amount` - Coins moved
/// * `reference` - Transfer id, content id or request id
pub fn log_ledger_event(event_type: &str, user_id: i64, amount: i64, reference: &str) {
    tracing::info!(
        event_type = event_type,
        user_id = user_id,
        amount = amount,
        reference = reference,
        "Ledger event committed"
    );
}

/// Log how long an aggregate query took
///
/// # Example
///
/// ```
/// use cl_server::logging::log_performance;
///
/// log_performance("commission_summary", 42, None);
/// ```
pub fn log_performance(operation: &str, duration_ms: u64, subject: Option<i64>) {
    tracing::debug!(
        operation = operation,
        duration_ms = duration_ms,
        subject = subject,
        "Performance metric"
    );
}

/// Log API request/response, warning when it ran long
pub fn log_api_request(
    method: &str,
    path: &str,
    status_code: u16,
    duration_ms: u64,
    user_id: Option<i64>,
) {
    if duration_ms > SLOW_REQUEST_MS {
        tracing::warn!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            user_id = user_id,
            "Slow API request"
        );
    } else {
        tracing::info!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            user_id = user_id,
            "API request completed"
        );
    }
}
