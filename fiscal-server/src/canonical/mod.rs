//! Canonical string construction
//!
//! Deterministic, delimiter-free serialization of receipts and day-close
//! reports. Field order, sort keys and rounding are protocol contracts;
//! any change here breaks signature verification against the remote
//! service.

pub mod day_report;
pub mod receipt;

pub use day_report::encode_day_report;
pub use receipt::{ReceiptFields, encode_receipt};
