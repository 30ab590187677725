//! Payment flow: invoice correlation and the purchase state machine

pub mod flow;
pub mod invoices;

pub use flow::PurchaseState;
pub use invoices::PendingInvoice;
