//! Persisted records for the fiscal protocol engine

pub mod device;
pub mod fiscal_day;
pub mod offline_queue;
pub mod receipt;
pub mod serde_helpers;
pub mod tax_config;

pub use device::FiscalDevice;
pub use fiscal_day::{DayCounter, FiscalDay};
pub use offline_queue::{OfflineQueueEntry, SubmissionAttempt};
pub use receipt::{AdjustmentRef, Receipt, ReceiptLine, ReceiptPayment, TaxLine};
pub use tax_config::{DeviceConfig, TaxEntry};
