//! Submission protocol driver
//!
//! Orchestrates one receipt submission end to end: configuration gate,
//! remote resync, duplicate detection, server-side recomputation,
//! chain extension, signing, sending, and escalation to the offline
//! queue on connectivity failure.

pub mod day;
pub mod driver;
pub mod recompute;

pub use day::DayFlow;
pub use driver::SubmitDriver;

use crate::db::models::{AdjustmentRef, ReceiptLine, ReceiptPayment, TaxLine};
use chrono::NaiveDateTime;
use shared::types::DocumentType;

/// Caller-supplied inputs for one receipt. Totals and tax amounts on
/// the lines are advisory; everything monetary is recomputed before
/// submission.
#[derive(Debug, Clone)]
pub struct ReceiptDraft {
    pub document_type: DocumentType,
    pub currency: String,
    /// Back-office document number, unique per (device, fiscal day).
    pub invoice_no: String,
    pub receipt_date: NaiveDateTime,
    pub lines: Vec<ReceiptLine>,
    pub payments: Vec<ReceiptPayment>,
    pub lines_tax_inclusive: bool,
    /// Pre-allocated tax bands (adjustments only). When absent the
    /// bands are derived from the lines.
    pub taxes: Option<Vec<TaxLine>>,
    pub adjustment: Option<AdjustmentRef>,
}
