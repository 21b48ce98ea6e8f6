//! Tax allocation for adjustment documents
//!
//! Credit notes distribute a target amount proportionally across the
//! original invoice's tax bands; debit notes synthesize bands for new
//! charges from the same reference invoice. Both preserve cent-exact
//! reconciliation between bands and the grand total.

pub mod credit;
pub mod debit;

pub use credit::{CreditNoteParts, build_credit_note};
pub use debit::{DebitNoteParts, build_debit_note};

use crate::common::error::{FiscalError, FiscalResult};
use crate::db::models::{AdjustmentRef, Receipt};
use chrono::{Months, NaiveDateTime};

/// Oldest original an adjustment may reference.
const MAX_ADJUSTMENT_AGE_MONTHS: u32 = 12;

/// Preconditions shared by credit and debit builders. Checked before
/// any allocation; failures never reach the remote service. Adjustments
/// are always issued in the original's currency, so there is no
/// currency precondition to check here.
pub(crate) fn validate_original(original: &Receipt, now: NaiveDateTime) -> FiscalResult<()> {
    if !original.is_fiscalized() {
        return Err(FiscalError::Validation(
            "Original receipt has not been fiscalized".to_string(),
        ));
    }
    if original.document_type.is_adjustment() {
        return Err(FiscalError::Validation(
            "Cannot adjust a credit or debit note".to_string(),
        ));
    }
    let ceiling = original
        .receipt_date
        .checked_add_months(Months::new(MAX_ADJUSTMENT_AGE_MONTHS))
        .ok_or_else(|| FiscalError::Internal("Receipt date out of range".to_string()))?;
    if now > ceiling {
        return Err(FiscalError::Validation(format!(
            "Original receipt is older than {} months",
            MAX_ADJUSTMENT_AGE_MONTHS
        )));
    }
    Ok(())
}

/// Denormalized reference block identifying the original document.
pub(crate) fn reference_for(original: &Receipt, reason: &str) -> AdjustmentRef {
    AdjustmentRef {
        original_receipt_global_no: original.receipt_global_no,
        original_fiscal_day_no: original.fiscal_day_no,
        original_remote_id: original.remote_id,
        reason: reason.to_string(),
    }
}
