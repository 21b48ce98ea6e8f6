//! Receipt model: one fiscalized document (invoice, credit or debit note)

use super::serde_helpers;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::types::{CreditStatus, DocumentType, MoneyType};
use surrealdb::RecordId;

/// One line item on a receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptLine {
    /// 1-based position.
    pub line_no: u32,
    pub name: String,
    /// Quantity stays positive on every document type, including credit
    /// notes (the price carries the sign).
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub tax_id: i32,
    pub tax_code: String,
    /// Absent for exempt bands.
    pub tax_percent: Option<Decimal>,
    /// Harmonized System commodity code.
    pub hs_code: String,
}

/// One tax band on a receipt: the tax-inclusive sales amount and the tax
/// portion for everything taxed at (tax_id, tax_code, percent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxLine {
    pub tax_id: i32,
    pub tax_code: String,
    pub tax_percent: Option<Decimal>,
    pub tax_amount: Decimal,
    pub sales_amount_with_tax: Decimal,
}

/// One payment against a receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptPayment {
    pub money_type: MoneyType,
    pub amount: Decimal,
}

/// Denormalized reference from an adjustment to its original invoice.
///
/// A snapshot rather than a live link, so a single receipt table stays a
/// DAG with reference depth one and the auditor never has to chase
/// records that may since have been archived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentRef {
    pub original_receipt_global_no: i64,
    pub original_fiscal_day_no: i32,
    /// Remote-assigned id of the original, when it was known at
    /// adjustment time.
    pub original_remote_id: Option<i64>,
    /// Free-text reason, required by the protocol for adjustments.
    pub reason: String,
}

/// A fiscalized receipt.
///
/// Persisted only after the remote service accepts it or it enters the
/// offline queue; never mutated once `remote_id` is set. Corrections are
/// new credit/debit receipts, never edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    pub device_id: i64,
    pub fiscal_day_no: i32,
    /// Globally increasing sequence number, unique per device.
    pub receipt_global_no: i64,
    /// Per-day counter, starting at 1.
    pub receipt_counter: i32,
    pub document_type: DocumentType,
    pub currency: String,
    /// Back-office document number, unique per (device, fiscal day).
    pub invoice_no: String,
    pub receipt_date: NaiveDateTime,
    pub lines: Vec<ReceiptLine>,
    pub taxes: Vec<TaxLine>,
    pub payments: Vec<ReceiptPayment>,
    pub lines_tax_inclusive: bool,
    pub total: Decimal,
    /// The exact canonical string that was hashed and signed.
    pub canonical_string: String,
    /// Base64 SHA-256 of the canonical string.
    pub digest: String,
    /// Base64 detached device signature over the canonical string.
    pub signature: String,
    /// Signature block returned by the remote service, when accepted.
    pub server_signature: Option<serde_json::Value>,
    /// Remote-assigned receipt id; non-null only once accepted.
    pub remote_id: Option<i64>,
    /// Present on credit and debit notes only.
    pub adjustment: Option<AdjustmentRef>,
    /// Invoice-side adjustment tracking (invoices only).
    #[serde(default)]
    pub credit_status: CreditStatus,
    #[serde(default)]
    pub credited_total: Decimal,
    #[serde(default)]
    pub debited_total: Decimal,
    pub created_at: i64,
}

impl Receipt {
    /// Whether the remote service has confirmed this receipt.
    pub fn is_fiscalized(&self) -> bool {
        matches!(self.remote_id, Some(id) if id != 0)
    }

    /// Balance still creditable on this invoice: original total minus
    /// confirmed credits, plus confirmed debits.
    pub fn remaining_balance(&self) -> Decimal {
        self.total - self.credited_total + self.debited_total
    }
}
