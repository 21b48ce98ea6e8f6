//! Fiscal device (signing entity) model

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use shared::types::FiscalDayStatus;
use surrealdb::RecordId;

/// A registered fiscal device: one point-of-sale signing identity.
///
/// `last_receipt_global_no` and `fiscal_day_status` are mutated only by
/// the submission driver and the day open/close flow, under the device's
/// exclusive lock. Reads outside that scope are snapshots, not truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiscalDevice {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,

    /// Numeric device identifier assigned by the tax authority.
    pub device_id: i64,

    /// Device certificate, PEM. Public; used for mTLS and verification.
    pub certificate_pem: String,

    /// Device private key, PEM (PKCS#8). Never logged.
    #[serde(default)]
    pub private_key_pem: String,

    pub is_registered: bool,

    /// Last fiscal day number the device is known to have reached.
    pub last_fiscal_day_no: Option<i32>,

    /// Last receipt sequence number confirmed by the remote service.
    pub last_receipt_global_no: Option<i64>,

    pub fiscal_day_status: Option<FiscalDayStatus>,

    pub created_at: i64,
}
