//! Debit note builder
//!
//! Additional charges against an original invoice. All monetary fields
//! stay positive. With multiple bands on the original the debit total is
//! allocated across them proportionally; with a single band its percent
//! is reused for the whole amount.

use super::credit::allocate_proportionally;
use super::{reference_for, validate_original};
use crate::common::error::{FiscalError, FiscalResult};
use crate::db::models::{AdjustmentRef, Receipt, ReceiptLine, TaxLine};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use shared::money::{extract_tax_from_inclusive, round2};

/// Everything the submission driver needs to fiscalize a debit note.
#[derive(Debug, Clone)]
pub struct DebitNoteParts {
    pub lines: Vec<ReceiptLine>,
    pub taxes: Vec<TaxLine>,
    pub total: Decimal,
    pub reference: AdjustmentRef,
}

pub fn build_debit_note(
    original: &Receipt,
    lines: Vec<ReceiptLine>,
    reason: &str,
    now: NaiveDateTime,
) -> FiscalResult<DebitNoteParts> {
    if lines.is_empty() {
        return Err(FiscalError::Validation(
            "Debit note requires at least one line".to_string(),
        ));
    }
    validate_original(original, now)?;
    if original.taxes.is_empty() {
        return Err(FiscalError::Validation(
            "Original receipt carries no tax bands".to_string(),
        ));
    }

    // Line totals recomputed from quantity and unit price; supplied
    // totals are never trusted.
    let mut recomputed = Vec::with_capacity(lines.len());
    let mut total = Decimal::ZERO;
    for (i, line) in lines.into_iter().enumerate() {
        let line_total = round2(line.quantity * line.unit_price);
        if line_total <= Decimal::ZERO {
            return Err(FiscalError::Validation(format!(
                "Debit line {} must be positive",
                i + 1
            )));
        }
        total += line_total;
        recomputed.push(ReceiptLine {
            line_no: (i + 1) as u32,
            total: line_total,
            ..line
        });
    }

    let taxes = if original.taxes.len() > 1 {
        let portions = allocate_proportionally(&original.taxes, original.total, total);
        original
            .taxes
            .iter()
            .zip(portions)
            .map(|(band, portion)| band_for(band, portion))
            .collect()
    } else {
        vec![band_for(&original.taxes[0], total)]
    };

    Ok(DebitNoteParts {
        lines: recomputed,
        taxes,
        total,
        reference: reference_for(original, reason),
    })
}

fn band_for(band: &TaxLine, portion: Decimal) -> TaxLine {
    let tax = match band.tax_percent {
        Some(pct) if !pct.is_zero() => extract_tax_from_inclusive(portion, pct),
        _ => Decimal::ZERO,
    };
    TaxLine {
        tax_id: band.tax_id,
        tax_code: band.tax_code.clone(),
        tax_percent: band.tax_percent,
        tax_amount: tax,
        sales_amount_with_tax: portion,
    }
}
