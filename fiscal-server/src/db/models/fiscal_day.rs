//! Fiscal day model

use super::serde_helpers;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::types::{CounterKind, FiscalDayStatus};
use surrealdb::RecordId;

/// One aggregated day-close counter bucket.
///
/// Tax counters carry `tax_id`/`tax_percent`; the payment balance
/// counter carries `money_type` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCounter {
    pub kind: CounterKind,
    pub currency: String,
    pub tax_id: Option<i32>,
    pub tax_percent: Option<Decimal>,
    pub money_type: Option<String>,
    pub value: Decimal,
}

impl DayCounter {
    /// Third component of the canonical sort: the tax id, or the money
    /// type uppercased.
    pub fn sort_token(&self) -> String {
        match self.tax_id {
            Some(id) => id.to_string(),
            None => self
                .money_type
                .as_deref()
                .unwrap_or_default()
                .to_uppercase(),
        }
    }

    /// Full canonical ordering key: (fixed kind rank, currency, token,
    /// percent). The percent breaks ties between two rates traded under
    /// one tax id.
    pub fn sort_key(&self) -> (u8, String, String, Decimal) {
        (
            self.kind.rank(),
            self.currency.to_uppercase(),
            self.sort_token(),
            self.tax_percent.unwrap_or_default(),
        )
    }
}

/// One record per (device, day number).
///
/// Transitions to `Closed` or `CloseFailed` only after the remote
/// service confirms; closing is asynchronous on the remote side. The
/// counter set and day-level signature submitted at close are stored so
/// the auditor can compare an independent rebuild against them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiscalDay {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    pub device_id: i64,
    pub fiscal_day_no: i32,
    pub status: FiscalDayStatus,
    /// Calendar date the day was opened; part of the close canonical.
    pub opened_date: NaiveDate,
    /// Millisecond timestamps.
    pub opened_at: i64,
    pub closed_at: Option<i64>,
    /// Error code reported by the remote service on a failed close.
    pub closing_error_code: Option<String>,
    /// Counter set submitted at close (empty until close is attempted).
    #[serde(default)]
    pub counters: Vec<DayCounter>,
    /// Canonical string, digest and signature of the close submission.
    pub close_canonical: Option<String>,
    pub close_digest: Option<String>,
    pub close_signature: Option<String>,
}
