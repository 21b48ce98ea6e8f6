//! Shared types for the fiscal back office
//!
//! Closed domain enums, decimal money arithmetic and time formatting
//! used across the signing crate and the fiscal server.

pub mod money;
pub mod types;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
pub use types::{CounterKind, CreditStatus, DocumentType, FiscalDayStatus, MoneyType, QueueState};
