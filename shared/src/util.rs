//! Time helpers shared across crates.

use chrono::{NaiveDate, NaiveDateTime};

/// Current UTC timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Current local date-time without timezone (receipt timestamps are
/// local wall-clock per the protocol).
pub fn now_naive() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Receipt date-time as it appears in the canonical string and payload.
pub fn format_receipt_date(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Fiscal day date as it appears in the day-close canonical string.
pub fn format_day_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_formats() {
        let dt = NaiveDate::from_ymd_opt(2025, 2, 11)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(format_receipt_date(&dt), "2025-02-11T10:30:00");
        assert_eq!(format_day_date(&dt.date()), "2025-02-11");
    }
}
