//! Gift module: monetized gifts between users.
//!
//! A gift send is one atomic unit: sender debit, recipient credit, optional
//! platform commission credit, the transfer row and its commission record.

pub mod commission;
pub mod coordinator;
pub mod models;

pub use commission::{CommissionRate, GiftSplit};
pub use coordinator::TransferCoordinator;
pub use models::{CommissionRecord, GiftReceipt, GiftTransfer, SendGiftRequest, TransferStatus};
