//! Prometheus metrics for the coin ledger server.
//!
//! Metrics are exposed in Prometheus text format on a dedicated listener.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts and duration by route and status
//! - **Ledger Metrics**: Gifts, coins moved, commission, unlocks, purchases
//! - **Failure Metrics**: Ledger errors by kind
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use cl_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/v1/gifts", 200);
//! metrics::gift_sent(100, 30);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`. Must be called from
/// within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Ledger Metrics
// ============================================================================

/// Record a committed gift.
pub fn gift_sent(price: i64, commission: i64) {
    metrics::counter!("gifts_sent_total").increment(1);
    metrics::counter!("coins_moved_total", "kind" => "gift").increment(price.max(0) as u64);
    metrics::counter!("commission_coins_total").increment(commission.max(0) as u64);
}

/// Record a charged unlock.
pub fn content_unlocked(cost: i64) {
    metrics::counter!("unlocks_total").increment(1);
    metrics::counter!("coins_moved_total", "kind" => "unlock").increment(cost.max(0) as u64);
}

/// Record an approved purchase.
pub fn purchase_approved(coin_amount: i64) {
    metrics::counter!("purchases_approved_total").increment(1);
    metrics::counter!("coins_moved_total", "kind" => "purchase")
        .increment(coin_amount.max(0) as u64);
}

/// Record an admin credit.
pub fn admin_credit(amount: i64) {
    metrics::counter!("coins_moved_total", "kind" => "admin_credit").increment(amount.max(0) as u64);
}

// ============================================================================
// Failure Metrics
// ============================================================================

/// Increment ledger failures by error kind.
pub fn ledger_failures_total(kind: &'static str) {
    metrics::counter!("ledger_failures_total", "kind" => kind).increment(1);
}
