//! Money arithmetic using rust_decimal for precision
//!
//! All monetary math goes through `Decimal`; the wire and the canonical
//! strings carry integer minor units (cents). Rounding is half-up to two
//! decimal places, matching the remote service's own calculation.

use rust_decimal::prelude::*;

/// Tolerance for monetary comparisons (one cent).
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

const HUNDRED: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// Round to 2 decimal places, half-up.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a monetary value to integer minor units (cents).
pub fn to_cents(value: Decimal) -> i64 {
    (round2(value) * HUNDRED).round_dp(0).to_i64().unwrap_or(0)
}

/// Convert minor units back to a 2-decimal amount.
pub fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Extract VAT from a tax-inclusive amount: `total × pct / (100 + pct)`.
///
/// Must match the remote service's internal calculation to the cent.
pub fn extract_tax_from_inclusive(total: Decimal, tax_percent: Decimal) -> Decimal {
    if total.is_zero() || tax_percent.is_zero() {
        return Decimal::ZERO;
    }
    round2(total * tax_percent / (HUNDRED + tax_percent))
}

/// Net portion of a tax-inclusive amount.
pub fn extract_net_from_inclusive(total: Decimal, tax_percent: Decimal) -> Decimal {
    round2(total - extract_tax_from_inclusive(total, tax_percent))
}

/// Format a tax percentage to exactly two decimal places ("15.00",
/// "14.50"). An absent percentage (exempt band) renders empty.
pub fn format_percent(percent: Option<Decimal>) -> String {
    match percent {
        Some(p) => format!("{:.2}", round2(p)),
        None => String::new(),
    }
}

/// Cent-exact equality between two amounts.
pub fn cents_equal(a: Decimal, b: Decimal) -> bool {
    to_cents(a) == to_cents(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn round2_is_half_up() {
        assert_eq!(round2(d("1.005")), d("1.01"));
        assert_eq!(round2(d("1.004")), d("1.00"));
        assert_eq!(round2(d("-1.005")), d("-1.01"));
    }

    #[test]
    fn to_cents_converts_after_rounding() {
        assert_eq!(to_cents(d("15.00")), 1500);
        assert_eq!(to_cents(d("15.005")), 1501);
        assert_eq!(to_cents(d("-3.47")), -347);
        assert_eq!(cents_to_decimal(1501), d("15.01"));
    }

    #[test]
    fn inclusive_tax_extraction() {
        // 115.00 at 15% inclusive: tax = 115 * 15 / 115 = 15.00
        assert_eq!(extract_tax_from_inclusive(d("115.00"), d("15")), d("15.00"));
        assert_eq!(extract_net_from_inclusive(d("115.00"), d("15")), d("100.00"));
        assert_eq!(extract_tax_from_inclusive(d("50.00"), d("0")), Decimal::ZERO);
    }

    #[test]
    fn net_plus_tax_reconstructs_inclusive_total() {
        let total = d("19.99");
        let pct = d("14.5");
        let tax = extract_tax_from_inclusive(total, pct);
        let net = extract_net_from_inclusive(total, pct);
        assert_eq!(net + tax, total);
    }

    #[test]
    fn percent_formatting() {
        assert_eq!(format_percent(Some(d("15"))), "15.00");
        assert_eq!(format_percent(Some(d("14.5"))), "14.50");
        assert_eq!(format_percent(None), "");
    }
}
