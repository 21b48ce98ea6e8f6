//! Offline queue replay
//!
//! Replays queued receipts strictly in sequence order. A network
//! failure pauses replay and leaves everything queued; a rejection
//! halts it at the failing receipt so no later receipt can jump the
//! chain.

use crate::common::error::{FiscalError, FiscalResult};
use crate::db::models::SubmissionAttempt;
use crate::db::repository::{DeviceRepository, OfflineQueueRepository, ReceiptRepository};
use crate::fdms::{FdmsApi, ReceiptDto, SubmitReceiptRequest};
use crate::fiscal_audit_log;
use shared::types::QueueState;
use std::sync::Arc;

/// Outcome of one replay pass.
#[derive(Debug, Default)]
pub struct ReplayReport {
    /// Sequence numbers confirmed during this pass.
    pub submitted: Vec<i64>,
    /// Rejection that halted the queue, when one occurred.
    pub halted: Option<String>,
    /// Replay stopped early because connectivity dropped again.
    pub network_interrupted: bool,
}

#[derive(Clone)]
pub struct OfflineReplayer {
    api: Arc<dyn FdmsApi>,
    devices: DeviceRepository,
    receipts: ReceiptRepository,
    queue: OfflineQueueRepository,
}

impl OfflineReplayer {
    pub fn new(
        api: Arc<dyn FdmsApi>,
        devices: DeviceRepository,
        receipts: ReceiptRepository,
        queue: OfflineQueueRepository,
    ) -> Self {
        Self {
            api,
            devices,
            receipts,
            queue,
        }
    }

    /// Drain the queue for one device. Must run inside the device's
    /// exclusive lock.
    pub async fn replay(&self, device_id: i64) -> FiscalResult<ReplayReport> {
        let mut report = ReplayReport::default();

        for entry in self.queue.pending(device_id).await? {
            let entry_id = entry
                .id
                .clone()
                .ok_or_else(|| FiscalError::Internal("Queue entry without id".to_string()))?;
            let receipt = self
                .receipts
                .find_by_global_no(device_id, entry.receipt_global_no)
                .await?
                .ok_or_else(|| {
                    FiscalError::Internal(format!(
                        "Queued receipt {} has no stored record",
                        entry.receipt_global_no
                    ))
                })?;

            // The receipt may have been confirmed through another path
            // (e.g. the remote registered it despite a send timeout).
            if receipt.is_fiscalized() {
                self.queue
                    .set_state(&entry_id, QueueState::Submitted, None)
                    .await?;
                continue;
            }

            self.queue
                .set_state(&entry_id, QueueState::Submitting, None)
                .await?;
            let request = SubmitReceiptRequest {
                receipt: ReceiptDto::from_receipt(&receipt),
            };

            match self.api.submit_receipt(device_id, &request).await {
                Ok(response) => {
                    let receipt_id = receipt.id.clone().ok_or_else(|| {
                        FiscalError::Internal("Stored receipt without id".to_string())
                    })?;
                    self.receipts
                        .mark_fiscalized(
                            &receipt_id,
                            response.receipt_id,
                            response.receipt_server_signature,
                        )
                        .await?;
                    self.queue
                        .set_state(&entry_id, QueueState::Submitted, None)
                        .await?;
                    self.record_attempt(device_id, entry.receipt_global_no, true, None)
                        .await?;
                    self.devices
                        .update_sequence(device_id, entry.receipt_global_no, entry.fiscal_day_no)
                        .await?;
                    fiscal_audit_log!(
                        device_id,
                        "replay_receipt",
                        entry.receipt_global_no,
                        receipt.digest.as_str()
                    );
                    report.submitted.push(entry.receipt_global_no);
                }
                Err(e) if e.is_network() => {
                    self.queue
                        .set_state(&entry_id, QueueState::Queued, None)
                        .await?;
                    self.record_attempt(
                        device_id,
                        entry.receipt_global_no,
                        false,
                        Some(e.to_string()),
                    )
                    .await?;
                    tracing::warn!(
                        device_id,
                        receipt_global_no = entry.receipt_global_no,
                        error = %e,
                        "Replay interrupted by network failure"
                    );
                    report.network_interrupted = true;
                    break;
                }
                Err(e) => {
                    // Rejection: halt the whole queue here. Later
                    // receipts chain onto this one and must not be
                    // submitted past it.
                    let reason = e.to_string();
                    self.queue
                        .set_state(&entry_id, QueueState::Failed, Some(reason.clone()))
                        .await?;
                    self.record_attempt(
                        device_id,
                        entry.receipt_global_no,
                        false,
                        Some(reason.clone()),
                    )
                    .await?;
                    tracing::error!(
                        device_id,
                        receipt_global_no = entry.receipt_global_no,
                        reason = %reason,
                        "Replay halted by rejection"
                    );
                    report.halted = Some(reason);
                    break;
                }
            }
        }

        Ok(report)
    }

    async fn record_attempt(
        &self,
        device_id: i64,
        receipt_global_no: i64,
        success: bool,
        error_message: Option<String>,
    ) -> FiscalResult<()> {
        self.queue
            .record_attempt(SubmissionAttempt {
                id: None,
                device_id,
                receipt_global_no,
                success,
                error_message,
                attempted_at: shared::util::now_millis(),
            })
            .await?;
        Ok(())
    }
}
