//! Day-close canonical string

use crate::db::models::DayCounter;
use chrono::NaiveDate;
use shared::money::{format_percent, to_cents};

/// Encode the day-close report into its canonical string.
///
/// Concatenation order: device id, fiscal day number, opened date, then
/// each non-zero counter sorted by (fixed kind rank, currency, tax id
/// or money type, percent) as KIND + CURRENCY + (percent | money type)
/// + value in cents. With no counters the canonical is just the header.
pub fn encode_day_report(
    device_id: i64,
    fiscal_day_no: i32,
    opened_date: NaiveDate,
    counters: &[DayCounter],
) -> String {
    let mut out = String::new();
    out.push_str(&device_id.to_string());
    out.push_str(&fiscal_day_no.to_string());
    out.push_str(&shared::util::format_day_date(&opened_date));

    let mut sorted: Vec<&DayCounter> = counters
        .iter()
        .filter(|c| to_cents(c.value) != 0)
        .collect();
    sorted.sort_by_key(|c| c.sort_key());

    for counter in sorted {
        out.push_str(counter.kind.canonical_token());
        out.push_str(&counter.currency.to_uppercase());
        match &counter.money_type {
            Some(money_type) => out.push_str(&money_type.to_uppercase()),
            None => out.push_str(&format_percent(counter.tax_percent)),
        }
        out.push_str(&to_cents(counter.value).to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::types::CounterKind;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn tax_counter(kind: CounterKind, currency: &str, tax_id: i32, pct: &str, value: &str) -> DayCounter {
        DayCounter {
            kind,
            currency: currency.to_string(),
            tax_id: Some(tax_id),
            tax_percent: Some(pct.parse().unwrap()),
            money_type: None,
            value: value.parse().unwrap(),
        }
    }

    fn balance_counter(currency: &str, money_type: &str, value: &str) -> DayCounter {
        DayCounter {
            kind: CounterKind::BalanceByMoneyType,
            currency: currency.to_string(),
            tax_id: None,
            tax_percent: None,
            money_type: Some(money_type.to_string()),
            value: value.parse().unwrap(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 11).unwrap()
    }

    #[test]
    fn empty_counter_set_is_just_the_header() {
        assert_eq!(encode_day_report(12345, 3, day(), &[]), "1234532025-02-11");
    }

    #[test]
    fn counters_sorted_by_rank_currency_and_token() {
        // Supplied in scrambled order across kinds and currencies.
        let counters = vec![
            balance_counter("USD", "CASH", "115.00"),
            tax_counter(CounterKind::SaleTaxByTax, "USD", 3, "15", "15.00"),
            tax_counter(CounterKind::SaleByTax, "ZWG", 3, "15", "230.00"),
            tax_counter(CounterKind::SaleByTax, "USD", 3, "15", "115.00"),
            tax_counter(CounterKind::SaleByTax, "USD", 1, "0", "50.00"),
        ];
        let canonical = encode_day_report(12345, 3, day(), &counters);
        assert_eq!(
            canonical,
            "1234532025-02-11\
             SALEBYTAXUSD0.005000\
             SALEBYTAXUSD15.0011500\
             SALEBYTAXZWG15.0023000\
             SALETAXBYTAXUSD15.001500\
             BALANCEBYMONEYTYPEUSDCASH11500"
        );
    }

    #[test]
    fn two_percents_under_one_tax_id_order_by_percent() {
        let counters = vec![
            tax_counter(CounterKind::SaleByTax, "USD", 3, "15", "115.00"),
            tax_counter(CounterKind::SaleByTax, "USD", 3, "14.5", "114.50"),
        ];
        let canonical = encode_day_report(1, 1, day(), &counters);
        assert_eq!(
            canonical,
            "112025-02-11SALEBYTAXUSD14.5011450SALEBYTAXUSD15.0011500"
        );
    }

    #[test]
    fn zero_valued_counters_are_dropped() {
        let counters = vec![
            tax_counter(CounterKind::SaleByTax, "USD", 1, "0", "0.00"),
            tax_counter(CounterKind::SaleByTax, "USD", 3, "15", "10.00"),
        ];
        let canonical = encode_day_report(1, 1, day(), &counters);
        assert_eq!(canonical, "112025-02-11SALEBYTAXUSD15.001000");
    }

    #[test]
    fn credit_note_counters_keep_their_sign() {
        let counters = vec![tax_counter(
            CounterKind::CreditNoteByTax,
            "USD",
            3,
            "15",
            "-23.00",
        )];
        let canonical = encode_day_report(1, 2, day(), &counters);
        assert_eq!(canonical, "122025-02-11CREDITNOTEBYTAXUSD15.00-2300");
    }
}
