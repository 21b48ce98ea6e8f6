//! Credit note builder
//!
//! Allocates a target credit amount across the original invoice's tax
//! bands in proportion to each band's tax-inclusive sales amount, then
//! re-derives the tax portion with the inclusive-extraction formula.
//! The rounding remainder lands on the last band so the allocation sums
//! exactly. Bands are inherited from the original, not re-derived from
//! a live tax table; the remote service validates them against the
//! original document.

use super::{reference_for, validate_original};
use crate::common::error::{FiscalError, FiscalResult};
use crate::db::models::{AdjustmentRef, Receipt, ReceiptLine, TaxLine};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use shared::money::{extract_tax_from_inclusive, round2};

/// Everything the submission driver needs to fiscalize a credit note.
/// All monetary fields are negative; quantities stay positive.
#[derive(Debug, Clone)]
pub struct CreditNoteParts {
    pub lines: Vec<ReceiptLine>,
    pub taxes: Vec<TaxLine>,
    pub total: Decimal,
    pub reference: AdjustmentRef,
}

pub fn build_credit_note(
    original: &Receipt,
    amount: Decimal,
    reason: &str,
    now: NaiveDateTime,
) -> FiscalResult<CreditNoteParts> {
    if amount <= Decimal::ZERO {
        return Err(FiscalError::Validation(
            "Credit amount must be positive".to_string(),
        ));
    }
    validate_original(original, now)?;
    if amount > original.remaining_balance() {
        return Err(FiscalError::OverCredit(format!(
            "Credit {} exceeds remaining balance {}",
            amount,
            original.remaining_balance()
        )));
    }
    if original.taxes.is_empty() || original.total <= Decimal::ZERO {
        return Err(FiscalError::Validation(
            "Original receipt carries no allocatable tax bands".to_string(),
        ));
    }

    let allocated = allocate_proportionally(&original.taxes, original.total, amount);

    let mut taxes = Vec::with_capacity(allocated.len());
    let mut lines = Vec::with_capacity(allocated.len());
    for (i, (band, portion)) in original.taxes.iter().zip(allocated.iter()).enumerate() {
        let tax = match band.tax_percent {
            Some(pct) if !pct.is_zero() => extract_tax_from_inclusive(*portion, pct),
            _ => Decimal::ZERO,
        };
        taxes.push(TaxLine {
            tax_id: band.tax_id,
            tax_code: band.tax_code.clone(),
            tax_percent: band.tax_percent,
            tax_amount: -tax,
            sales_amount_with_tax: -*portion,
        });
        lines.push(ReceiptLine {
            line_no: (i + 1) as u32,
            name: format!("Credit note: {}", reason),
            quantity: Decimal::ONE,
            unit_price: -*portion,
            total: -*portion,
            tax_id: band.tax_id,
            tax_code: band.tax_code.clone(),
            tax_percent: band.tax_percent,
            hs_code: original
                .lines
                .iter()
                .find(|l| l.tax_id == band.tax_id)
                .or_else(|| original.lines.first())
                .map(|l| l.hs_code.clone())
                .unwrap_or_default(),
        });
    }

    Ok(CreditNoteParts {
        lines,
        taxes,
        total: -amount,
        reference: reference_for(original, reason),
    })
}

/// Split `amount` across bands proportionally to their sales amounts,
/// assigning the rounding remainder to the last band.
pub(crate) fn allocate_proportionally(
    bands: &[TaxLine],
    original_total: Decimal,
    amount: Decimal,
) -> Vec<Decimal> {
    let ratio = amount / original_total;
    let mut portions: Vec<Decimal> = bands
        .iter()
        .map(|b| round2(b.sales_amount_with_tax * ratio))
        .collect();
    let assigned: Decimal = portions.iter().sum();
    let remainder = amount - assigned;
    if let Some(last) = portions.last_mut() {
        *last += remainder;
    }
    portions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::types::DocumentType;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date(y: i32, m: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, day)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn band(tax_id: i32, pct: Option<&str>, tax: &str, sales: &str) -> TaxLine {
        TaxLine {
            tax_id,
            tax_code: "C".to_string(),
            tax_percent: pct.map(|p| p.parse().unwrap()),
            tax_amount: tax.parse().unwrap(),
            sales_amount_with_tax: sales.parse().unwrap(),
        }
    }

    fn invoice(total: &str, taxes: Vec<TaxLine>) -> Receipt {
        Receipt {
            id: None,
            device_id: 1,
            fiscal_day_no: 4,
            receipt_global_no: 120,
            receipt_counter: 3,
            document_type: DocumentType::Invoice,
            currency: "USD".to_string(),
            invoice_no: "INV-120".to_string(),
            receipt_date: date(2025, 2, 11),
            lines: vec![],
            taxes,
            payments: vec![],
            lines_tax_inclusive: true,
            total: d(total),
            canonical_string: String::new(),
            digest: String::new(),
            signature: String::new(),
            server_signature: None,
            remote_id: Some(991),
            adjustment: None,
            credit_status: Default::default(),
            credited_total: Decimal::ZERO,
            debited_total: Decimal::ZERO,
            created_at: 0,
        }
    }

    #[test]
    fn allocation_sums_exactly_with_remainder_on_last_band() {
        let original = invoice(
            "100.00",
            vec![
                band(1, Some("0"), "0.00", "33.33"),
                band(2, Some("15"), "5.22", "33.33"),
                band(3, Some("15"), "5.23", "33.34"),
            ],
        );
        let parts = build_credit_note(&original, d("10.00"), "damaged goods", date(2025, 3, 1)).unwrap();

        let sum: Decimal = parts.taxes.iter().map(|t| t.sales_amount_with_tax).sum();
        assert_eq!(sum, d("-10.00"));
        assert_eq!(parts.total, d("-10.00"));
        // Every band negative, quantities positive.
        assert!(parts.taxes.iter().all(|t| t.sales_amount_with_tax < Decimal::ZERO));
        assert!(parts.lines.iter().all(|l| l.quantity > Decimal::ZERO));
    }

    #[test]
    fn full_credit_reproduces_original_band_ratios() {
        let original = invoice(
            "150.00",
            vec![
                band(1, Some("0"), "0.00", "50.00"),
                band(3, Some("15"), "13.04", "100.00"),
            ],
        );
        let parts = build_credit_note(&original, d("150.00"), "full refund", date(2025, 3, 1)).unwrap();
        assert_eq!(parts.taxes[0].sales_amount_with_tax, d("-50.00"));
        assert_eq!(parts.taxes[1].sales_amount_with_tax, d("-100.00"));
        assert_eq!(parts.taxes[1].tax_amount, d("-13.04"));
    }

    #[test]
    fn inclusive_tax_rederived_per_band() {
        let original = invoice("115.00", vec![band(3, Some("15"), "15.00", "115.00")]);
        let parts = build_credit_note(&original, d("23.00"), "partial", date(2025, 3, 1)).unwrap();
        // 23.00 at 15% inclusive: tax = 23 * 15 / 115 = 3.00
        assert_eq!(parts.taxes[0].tax_amount, d("-3.00"));
        assert_eq!(parts.taxes[0].sales_amount_with_tax, d("-23.00"));
    }

    #[test]
    fn over_credit_is_rejected() {
        let mut original = invoice("115.00", vec![band(3, Some("15"), "15.00", "115.00")]);
        original.credited_total = d("100.00");
        let err = build_credit_note(&original, d("20.00"), "too much", date(2025, 3, 1)).unwrap_err();
        assert!(matches!(err, FiscalError::OverCredit(_)));
    }

    #[test]
    fn stale_original_is_rejected() {
        let original = invoice("115.00", vec![band(3, Some("15"), "15.00", "115.00")]);
        let err = build_credit_note(&original, d("10.00"), "late", date(2026, 2, 12)).unwrap_err();
        assert!(matches!(err, FiscalError::Validation(_)));
    }

    #[test]
    fn unfiscalized_or_adjustment_originals_are_rejected() {
        let mut original = invoice("115.00", vec![band(3, Some("15"), "15.00", "115.00")]);
        original.remote_id = None;
        assert!(matches!(
            build_credit_note(&original, d("10.00"), "r", date(2025, 3, 1)).unwrap_err(),
            FiscalError::Validation(_)
        ));

        let mut note = invoice("115.00", vec![band(3, Some("15"), "15.00", "115.00")]);
        note.document_type = DocumentType::CreditNote;
        assert!(matches!(
            build_credit_note(&note, d("10.00"), "r", date(2025, 3, 1)).unwrap_err(),
            FiscalError::Validation(_)
        ));
    }

    #[test]
    fn reference_block_snapshots_the_original() {
        let original = invoice("115.00", vec![band(3, Some("15"), "15.00", "115.00")]);
        let parts = build_credit_note(&original, d("10.00"), "damaged", date(2025, 3, 1)).unwrap();
        assert_eq!(parts.reference.original_receipt_global_no, 120);
        assert_eq!(parts.reference.original_fiscal_day_no, 4);
        assert_eq!(parts.reference.original_remote_id, Some(991));
        assert_eq!(parts.reference.reason, "damaged");
    }
}
