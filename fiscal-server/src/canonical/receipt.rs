//! Receipt canonical string

use crate::db::models::TaxLine;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use shared::money::{format_percent, to_cents};
use shared::types::DocumentType;

/// The fields that enter a receipt's canonical string, in their fixed
/// order. Monetary values are still decimals here; conversion to minor
/// units happens during encoding.
pub struct ReceiptFields<'a> {
    pub device_id: i64,
    pub document_type: DocumentType,
    pub currency: &'a str,
    pub receipt_global_no: i64,
    pub receipt_date: NaiveDateTime,
    pub total: Decimal,
    pub taxes: &'a [TaxLine],
    /// Digest of the preceding receipt in the same day, verbatim.
    pub previous_hash: Option<&'a str>,
}

/// Encode a receipt into its canonical string.
///
/// Concatenation order: device id, document type, currency, global
/// sequence number, date-time, total in cents, then each tax band
/// sorted ascending by (tax id, tax code) as code + percent + tax cents
/// + sales cents, then the previous digest verbatim. Credit notes carry
/// every cent value negative regardless of stored sign.
pub fn encode_receipt(fields: &ReceiptFields<'_>) -> String {
    let credit = fields.document_type == DocumentType::CreditNote;

    let mut out = String::new();
    out.push_str(&fields.device_id.to_string());
    out.push_str(fields.document_type.wire_name());
    out.push_str(&fields.currency.to_uppercase());
    out.push_str(&fields.receipt_global_no.to_string());
    out.push_str(&shared::util::format_receipt_date(&fields.receipt_date));
    out.push_str(&signed_cents(fields.total, credit).to_string());

    let mut bands: Vec<&TaxLine> = fields.taxes.iter().collect();
    bands.sort_by(|a, b| {
        (a.tax_id, a.tax_code.to_uppercase()).cmp(&(b.tax_id, b.tax_code.to_uppercase()))
    });
    for band in bands {
        out.push_str(&band.tax_code.to_uppercase());
        out.push_str(&format_percent(band.tax_percent));
        out.push_str(&signed_cents(band.tax_amount, credit).to_string());
        out.push_str(&signed_cents(band.sales_amount_with_tax, credit).to_string());
    }

    if let Some(prev) = fields.previous_hash {
        out.push_str(prev);
    }
    out
}

fn signed_cents(value: Decimal, credit: bool) -> i64 {
    let cents = to_cents(value);
    if credit { -cents.abs() } else { cents }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn band(tax_id: i32, code: &str, pct: Option<&str>, tax: &str, sales: &str) -> TaxLine {
        TaxLine {
            tax_id,
            tax_code: code.to_string(),
            tax_percent: pct.map(|p| p.parse().unwrap()),
            tax_amount: tax.parse().unwrap(),
            sales_amount_with_tax: sales.parse().unwrap(),
        }
    }

    #[test]
    fn golden_minimal_invoice() {
        let canonical = encode_receipt(&ReceiptFields {
            device_id: 12345,
            document_type: DocumentType::Invoice,
            currency: "USD",
            receipt_global_no: 1,
            receipt_date: date("2025-02-11T10:30:00"),
            total: d("15.00"),
            taxes: &[],
            previous_hash: None,
        });
        assert_eq!(canonical, "12345FISCALINVOICEUSD12025-02-11T10:30:001500");
    }

    #[test]
    fn tax_bands_sorted_and_formatted() {
        // Bands supplied out of order; encoding must sort by (id, code).
        let taxes = vec![
            band(3, "C", Some("15"), "13.04", "100.00"),
            band(1, "A", Some("0"), "0.00", "50.00"),
        ];
        let canonical = encode_receipt(&ReceiptFields {
            device_id: 7,
            document_type: DocumentType::Invoice,
            currency: "usd",
            receipt_global_no: 42,
            receipt_date: date("2025-03-01T09:00:00"),
            total: d("150.00"),
            taxes: &taxes,
            previous_hash: None,
        });
        assert_eq!(
            canonical,
            "7FISCALINVOICEUSD422025-03-01T09:00:0015000A0.0005000C15.00130410000"
        );
    }

    #[test]
    fn exempt_band_renders_empty_percent() {
        let taxes = vec![band(2, "B", None, "0.00", "20.00")];
        let canonical = encode_receipt(&ReceiptFields {
            device_id: 1,
            document_type: DocumentType::Invoice,
            currency: "ZWG",
            receipt_global_no: 9,
            receipt_date: date("2025-01-05T12:00:00"),
            total: d("20.00"),
            taxes: &taxes,
            previous_hash: None,
        });
        assert_eq!(canonical, "1FISCALINVOICEZWG92025-01-05T12:00:002000B02000");
    }

    #[test]
    fn credit_note_coerces_all_cents_negative() {
        // Amounts stored negative already; coercion must not double-flip.
        let taxes = vec![band(3, "C", Some("15"), "-1.30", "-10.00")];
        let canonical = encode_receipt(&ReceiptFields {
            device_id: 9999,
            document_type: DocumentType::CreditNote,
            currency: "USD",
            receipt_global_no: 7,
            receipt_date: date("2025-02-12T08:15:30"),
            total: d("-10.00"),
            taxes: &taxes,
            previous_hash: None,
        });
        assert_eq!(
            canonical,
            "9999CREDITNOTEUSD72025-02-12T08:15:30-1000C15.00-130-1000"
        );
    }

    #[test]
    fn previous_hash_appended_verbatim_last() {
        let prev = "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=";
        let canonical = encode_receipt(&ReceiptFields {
            device_id: 12345,
            document_type: DocumentType::Invoice,
            currency: "USD",
            receipt_global_no: 2,
            receipt_date: date("2025-02-11T10:31:00"),
            total: d("8.00"),
            taxes: &[],
            previous_hash: Some(prev),
        });
        assert!(canonical.ends_with(prev));
        assert_eq!(
            canonical,
            format!("12345FISCALINVOICEUSD22025-02-11T10:31:00800{}", prev)
        );
    }

    #[test]
    fn date_component_uses_seconds_precision() {
        let dt = NaiveDate::from_ymd_opt(2025, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let canonical = encode_receipt(&ReceiptFields {
            device_id: 1,
            document_type: DocumentType::DebitNote,
            currency: "USD",
            receipt_global_no: 3,
            receipt_date: dt,
            total: d("1.00"),
            taxes: &[],
            previous_hash: None,
        });
        assert_eq!(canonical, "1DEBITNOTEUSD32025-12-31T23:59:59100");
    }
}
