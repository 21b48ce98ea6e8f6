//! Daily counter aggregation
//!
//! Sums per-tax-band and per-payment-method totals across the
//! fiscalized receipts of a day into the fixed counter set submitted at
//! close. Kinds are never netted against each other: sales, credit
//! notes and debit notes keep separate buckets.

use crate::common::error::{FiscalError, FiscalResult};
use crate::db::models::{DayCounter, Receipt};
use rust_decimal::Decimal;
use shared::money::{cents_equal, to_cents};
use shared::types::{CounterKind, DocumentType};
use std::collections::BTreeMap;

/// Rebuild the day's counter set from its receipts.
///
/// Only remotely confirmed receipts count. Buckets summing to exactly
/// zero are dropped. If confirmed receipts exist but every bucket nets
/// to zero, the day is internally inconsistent and close must abort.
pub fn aggregate_day_counters(receipts: &[Receipt]) -> FiscalResult<Vec<DayCounter>> {
    let mut buckets: BTreeMap<(u8, String, String, Decimal), DayCounter> = BTreeMap::new();
    let mut any_fiscalized = false;

    for receipt in receipts.iter().filter(|r| r.is_fiscalized()) {
        any_fiscalized = true;
        let (sales_kind, tax_kind) = match receipt.document_type {
            DocumentType::Invoice => (CounterKind::SaleByTax, CounterKind::SaleTaxByTax),
            DocumentType::CreditNote => {
                (CounterKind::CreditNoteByTax, CounterKind::CreditNoteTaxByTax)
            }
            DocumentType::DebitNote => {
                (CounterKind::DebitNoteByTax, CounterKind::DebitNoteTaxByTax)
            }
        };

        for band in &receipt.taxes {
            add_tax(
                &mut buckets,
                sales_kind,
                receipt,
                band.tax_id,
                band.tax_percent,
                band.sales_amount_with_tax,
            );
            add_tax(
                &mut buckets,
                tax_kind,
                receipt,
                band.tax_id,
                band.tax_percent,
                band.tax_amount,
            );
        }

        // Payments are additively signed: stored negative on credit
        // notes, positive otherwise.
        for payment in &receipt.payments {
            let money_type = payment.money_type.balance_bucket().to_string();
            let key = (
                CounterKind::BalanceByMoneyType.rank(),
                receipt.currency.to_uppercase(),
                money_type.clone(),
                Decimal::ZERO,
            );
            buckets
                .entry(key)
                .or_insert_with(|| DayCounter {
                    kind: CounterKind::BalanceByMoneyType,
                    currency: receipt.currency.clone(),
                    tax_id: None,
                    tax_percent: None,
                    money_type: Some(money_type),
                    value: Decimal::ZERO,
                })
                .value += payment.amount;
        }
    }

    let counters: Vec<DayCounter> = buckets
        .into_values()
        .filter(|c| to_cents(c.value) != 0)
        .collect();

    if any_fiscalized && counters.is_empty() {
        return Err(FiscalError::Internal(
            "Fiscalized receipts exist but the day counter set is empty".to_string(),
        ));
    }
    Ok(counters)
}

fn add_tax(
    buckets: &mut BTreeMap<(u8, String, String, Decimal), DayCounter>,
    kind: CounterKind,
    receipt: &Receipt,
    tax_id: i32,
    tax_percent: Option<Decimal>,
    amount: Decimal,
) {
    // Exempt bands carry no percent and produce no tax counters; their
    // sales still reach the payment balance counter.
    let Some(percent) = tax_percent else {
        return;
    };
    // A mid-day rate change under one tax id keeps two buckets.
    let key = (
        kind.rank(),
        receipt.currency.to_uppercase(),
        tax_id.to_string(),
        percent,
    );
    buckets
        .entry(key)
        .or_insert_with(|| DayCounter {
            kind,
            currency: receipt.currency.clone(),
            tax_id: Some(tax_id),
            tax_percent,
            money_type: None,
            value: Decimal::ZERO,
        })
        .value += amount;
}

/// Structural comparison of two counter sets, used by the integrity
/// auditor against the set recorded at close.
pub fn counters_match(a: &[DayCounter], b: &[DayCounter]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left: Vec<&DayCounter> = a.iter().collect();
    let mut right: Vec<&DayCounter> = b.iter().collect();
    left.sort_by_key(|c| c.sort_key());
    right.sort_by_key(|c| c.sort_key());
    left.iter().zip(right.iter()).all(|(x, y)| {
        x.kind == y.kind
            && x.currency.eq_ignore_ascii_case(&y.currency)
            && x.tax_id == y.tax_id
            && x.tax_percent == y.tax_percent
            && x.money_type == y.money_type
            && cents_equal(x.value, y.value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ReceiptPayment, TaxLine};
    use shared::types::MoneyType;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn receipt(
        doc: DocumentType,
        remote_id: Option<i64>,
        taxes: Vec<TaxLine>,
        payments: Vec<ReceiptPayment>,
    ) -> Receipt {
        Receipt {
            id: None,
            device_id: 1,
            fiscal_day_no: 1,
            receipt_global_no: 1,
            receipt_counter: 1,
            document_type: doc,
            currency: "USD".to_string(),
            invoice_no: "INV-1".to_string(),
            receipt_date: chrono::NaiveDate::from_ymd_opt(2025, 2, 11)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            lines: vec![],
            taxes,
            payments,
            lines_tax_inclusive: true,
            total: d("115.00"),
            canonical_string: String::new(),
            digest: String::new(),
            signature: String::new(),
            server_signature: None,
            remote_id,
            adjustment: None,
            credit_status: Default::default(),
            credited_total: Decimal::ZERO,
            debited_total: Decimal::ZERO,
            created_at: 0,
        }
    }

    fn band(tax_id: i32, pct: &str, tax: &str, sales: &str) -> TaxLine {
        TaxLine {
            tax_id,
            tax_code: "C".to_string(),
            tax_percent: Some(pct.parse().unwrap()),
            tax_amount: tax.parse().unwrap(),
            sales_amount_with_tax: sales.parse().unwrap(),
        }
    }

    fn pay(money_type: MoneyType, amount: &str) -> ReceiptPayment {
        ReceiptPayment {
            money_type,
            amount: amount.parse().unwrap(),
        }
    }

    #[test]
    fn sales_and_credit_buckets_stay_separate() {
        let receipts = vec![
            receipt(
                DocumentType::Invoice,
                Some(10),
                vec![band(3, "15", "15.00", "115.00")],
                vec![pay(MoneyType::Cash, "115.00")],
            ),
            receipt(
                DocumentType::CreditNote,
                Some(11),
                vec![band(3, "15", "-15.00", "-115.00")],
                vec![pay(MoneyType::Cash, "-115.00")],
            ),
        ];
        let counters = aggregate_day_counters(&receipts).unwrap();

        let sale = counters
            .iter()
            .find(|c| c.kind == CounterKind::SaleByTax)
            .unwrap();
        let credit = counters
            .iter()
            .find(|c| c.kind == CounterKind::CreditNoteByTax)
            .unwrap();
        assert_eq!(sale.value, d("115.00"));
        assert_eq!(credit.value, d("-115.00"));
        // Cash balance nets to zero and is dropped.
        assert!(
            !counters
                .iter()
                .any(|c| c.kind == CounterKind::BalanceByMoneyType)
        );
    }

    fn exempt_band(tax_id: i32, sales: &str) -> TaxLine {
        TaxLine {
            tax_id,
            tax_code: "E".to_string(),
            tax_percent: None,
            tax_amount: Decimal::ZERO,
            sales_amount_with_tax: sales.parse().unwrap(),
        }
    }

    #[test]
    fn exempt_bands_feed_only_the_payment_balance() {
        let receipts = vec![receipt(
            DocumentType::Invoice,
            Some(1),
            vec![exempt_band(2, "50.00")],
            vec![pay(MoneyType::Cash, "50.00")],
        )];
        let counters = aggregate_day_counters(&receipts).unwrap();

        assert!(
            !counters
                .iter()
                .any(|c| c.kind == CounterKind::SaleByTax || c.kind == CounterKind::SaleTaxByTax)
        );
        let balance = counters
            .iter()
            .find(|c| c.kind == CounterKind::BalanceByMoneyType)
            .unwrap();
        assert_eq!(balance.value, d("50.00"));
    }

    #[test]
    fn same_tax_id_with_two_percents_keeps_separate_buckets() {
        // A mid-day rate change: both rates traded under tax id 3.
        let receipts = vec![
            receipt(
                DocumentType::Invoice,
                Some(1),
                vec![band(3, "15", "15.00", "115.00")],
                vec![pay(MoneyType::Cash, "115.00")],
            ),
            receipt(
                DocumentType::Invoice,
                Some(2),
                vec![band(3, "14.5", "14.50", "114.50")],
                vec![pay(MoneyType::Cash, "114.50")],
            ),
        ];
        let counters = aggregate_day_counters(&receipts).unwrap();

        let sales: Vec<_> = counters
            .iter()
            .filter(|c| c.kind == CounterKind::SaleByTax)
            .collect();
        assert_eq!(sales.len(), 2);
        assert!(sales.iter().any(|c| c.tax_percent == Some(d("15")) && c.value == d("115.00")));
        assert!(sales.iter().any(|c| c.tax_percent == Some(d("14.5")) && c.value == d("114.50")));
    }

    #[test]
    fn unconfirmed_receipts_are_ignored() {
        let receipts = vec![receipt(
            DocumentType::Invoice,
            None,
            vec![band(3, "15", "15.00", "115.00")],
            vec![pay(MoneyType::Cash, "115.00")],
        )];
        let counters = aggregate_day_counters(&receipts).unwrap();
        assert!(counters.is_empty());
    }

    #[test]
    fn card_like_payments_share_one_bucket() {
        let receipts = vec![receipt(
            DocumentType::Invoice,
            Some(1),
            vec![band(3, "15", "15.00", "115.00")],
            vec![pay(MoneyType::Card, "60.00"), pay(MoneyType::MobileWallet, "55.00")],
        )];
        let counters = aggregate_day_counters(&receipts).unwrap();
        let balance: Vec<_> = counters
            .iter()
            .filter(|c| c.kind == CounterKind::BalanceByMoneyType)
            .collect();
        assert_eq!(balance.len(), 1);
        assert_eq!(balance[0].money_type.as_deref(), Some("CARD"));
        assert_eq!(balance[0].value, d("115.00"));
    }

    #[test]
    fn zero_netting_day_with_receipts_is_an_inconsistency() {
        // A lone zero-amount confirmed receipt nets every bucket to zero.
        let receipts = vec![receipt(
            DocumentType::Invoice,
            Some(5),
            vec![band(1, "0", "0.00", "0.00")],
            vec![pay(MoneyType::Cash, "0.00")],
        )];
        let err = aggregate_day_counters(&receipts).unwrap_err();
        assert!(matches!(err, FiscalError::Internal(_)));
    }

    #[test]
    fn counter_sets_compare_structurally() {
        let receipts = vec![receipt(
            DocumentType::Invoice,
            Some(1),
            vec![band(3, "15", "15.00", "115.00")],
            vec![pay(MoneyType::Cash, "115.00")],
        )];
        let a = aggregate_day_counters(&receipts).unwrap();
        let mut b = a.clone();
        assert!(counters_match(&a, &b));
        b[0].value += d("0.01");
        assert!(!counters_match(&a, &b));
    }
}
