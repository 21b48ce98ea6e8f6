//! Server-side amount recomputation
//!
//! Client-supplied totals are never trusted: line totals, tax bands and
//! the grand total are rebuilt from raw quantities and unit prices, then
//! cross-checked to the cent before any network call.

use super::ReceiptDraft;
use crate::common::error::{FiscalError, FiscalResult};
use crate::db::models::{ReceiptLine, TaxLine};
use rust_decimal::Decimal;
use shared::money::{cents_equal, extract_tax_from_inclusive, round2};
use std::collections::BTreeMap;

/// The amounts a receipt is actually submitted with.
#[derive(Debug, Clone)]
pub struct RecomputedAmounts {
    pub lines: Vec<ReceiptLine>,
    pub taxes: Vec<TaxLine>,
    pub total: Decimal,
}

/// Rebuild and reconcile all amounts of a draft.
pub fn recompute(draft: &ReceiptDraft) -> FiscalResult<RecomputedAmounts> {
    if draft.lines.is_empty() {
        return Err(FiscalError::Validation(
            "Receipt requires at least one line".to_string(),
        ));
    }
    for (i, line) in draft.lines.iter().enumerate() {
        // HS codes are either the 4-digit heading or the full 8-digit
        // commodity code.
        let len = line.hs_code.chars().count();
        if len != 4 && len != 8 {
            return Err(FiscalError::Validation(format!(
                "Line {} HS code {:?} must be 4 or 8 characters",
                i + 1,
                line.hs_code
            )));
        }
    }

    let lines = recompute_lines(&draft.lines);
    let taxes = match &draft.taxes {
        Some(taxes) => taxes.clone(),
        None => derive_tax_lines(&lines, draft.lines_tax_inclusive),
    };

    let line_sum: Decimal = lines.iter().map(|l| l.total).sum();
    let tax_sum: Decimal = taxes.iter().map(|t| t.tax_amount).sum();
    let total = if draft.lines_tax_inclusive {
        line_sum
    } else {
        round2(line_sum + tax_sum)
    };

    let band_sum: Decimal = taxes.iter().map(|t| t.sales_amount_with_tax).sum();
    if !cents_equal(band_sum, total) {
        return Err(FiscalError::Validation(format!(
            "Tax bands sum to {} but the receipt total is {}",
            band_sum, total
        )));
    }

    let payment_sum: Decimal = draft.payments.iter().map(|p| p.amount).sum();
    if !cents_equal(payment_sum, total) {
        return Err(FiscalError::Validation(format!(
            "Payments sum to {} but the receipt total is {}",
            payment_sum, total
        )));
    }

    Ok(RecomputedAmounts {
        lines,
        taxes,
        total,
    })
}

/// Renumber lines and rebuild each total from quantity × unit price.
fn recompute_lines(lines: &[ReceiptLine]) -> Vec<ReceiptLine> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| ReceiptLine {
            line_no: (i + 1) as u32,
            total: round2(line.quantity * line.unit_price),
            ..line.clone()
        })
        .collect()
}

/// Group lines into tax bands keyed by (tax id, code, percent).
///
/// Tax-inclusive mode extracts the VAT portion from the gross line sum;
/// tax-exclusive mode computes tax on the net and adds it on top.
fn derive_tax_lines(lines: &[ReceiptLine], tax_inclusive: bool) -> Vec<TaxLine> {
    let mut groups: BTreeMap<(i32, String, String), (Option<Decimal>, Decimal)> = BTreeMap::new();
    for line in lines {
        let key = (
            line.tax_id,
            line.tax_code.to_uppercase(),
            shared::money::format_percent(line.tax_percent),
        );
        let entry = groups.entry(key).or_insert((line.tax_percent, Decimal::ZERO));
        entry.1 += line.total;
    }

    groups
        .into_iter()
        .map(|((tax_id, tax_code, _), (percent, line_sum))| {
            let (tax_amount, sales_with_tax) = match percent {
                Some(pct) if !pct.is_zero() => {
                    if tax_inclusive {
                        (extract_tax_from_inclusive(line_sum, pct), line_sum)
                    } else {
                        let tax = round2(line_sum * pct / Decimal::ONE_HUNDRED);
                        (tax, round2(line_sum + tax))
                    }
                }
                _ => (Decimal::ZERO, line_sum),
            };
            TaxLine {
                tax_id,
                tax_code,
                tax_percent: percent,
                tax_amount,
                sales_amount_with_tax: sales_with_tax,
            }
        })
        .collect()
}
