//! Offline queue models

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use shared::types::QueueState;
use surrealdb::RecordId;

/// One queue entry per receipt created while the remote service was
/// unreachable. Append-only; replay order is (receipt_global_no,
/// fiscal_day_no, created_at) and entries are never reordered or
/// skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineQueueEntry {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    pub device_id: i64,
    pub receipt_global_no: i64,
    pub fiscal_day_no: i32,
    pub state: QueueState,
    pub failure_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Audit trail: one row per submission attempt against the remote
/// service, online or during replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionAttempt {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    pub device_id: i64,
    pub receipt_global_no: i64,
    pub success: bool,
    pub error_message: Option<String>,
    pub attempted_at: i64,
}
