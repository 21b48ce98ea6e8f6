//! Device tax configuration snapshot

use super::serde_helpers;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// One entry of the remote tax table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxEntry {
    pub tax_id: i32,
    pub tax_code: String,
    /// None for exempt bands (distinct from a 0% zero-rated band).
    pub tax_percent: Option<Decimal>,
}

/// Snapshot of the device configuration fetched from the remote
/// service: the currently valid currencies and tax table. Submission is
/// refused when the snapshot is absent or older than the staleness
/// window (24 h).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    pub device_id: i64,
    pub currencies: Vec<String>,
    pub taxes: Vec<TaxEntry>,
    /// Millisecond timestamp of the fetch.
    pub fetched_at: i64,
}

impl DeviceConfig {
    pub const STALENESS_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

    pub fn is_fresh(&self, now_millis: i64) -> bool {
        now_millis - self.fetched_at < Self::STALENESS_WINDOW_MS
    }

    pub fn tax_by_id(&self, tax_id: i32) -> Option<&TaxEntry> {
        self.taxes.iter().find(|t| t.tax_id == tax_id)
    }

    pub fn allows_currency(&self, currency: &str) -> bool {
        self.currencies.iter().any(|c| c.eq_ignore_ascii_case(currency))
    }
}
