//! Coin ledger HTTP server library.
//!
//! Exposes the router, configuration, logging and metrics so integration tests
//! can drive the API in-process.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
