//! Purchase module: operator-approved coin purchases.

pub mod models;
pub mod workflow;

pub use models::{
    NewPurchaseRequest, PurchaseApproval, PurchaseRequest, PurchaseResolution, PurchaseStatus,
};
pub use workflow::PurchaseWorkflow;
