//! Receipt submission driver
//!
//! State machine: Validating → Signing → Sending → Verifying →
//! Completed, with Failed(reason) reachable from any state. Network
//! exhaustion escalates to the offline queue instead of surfacing an
//! error to the caller.

use super::ReceiptDraft;
use super::recompute::{self, RecomputedAmounts};
use crate::canonical::{ReceiptFields, encode_receipt};
use crate::chain::{self, ChainState};
use crate::common::error::{FiscalError, FiscalResult};
use crate::config::{ConfigSource, validate_against_config};
use crate::db::models::{FiscalDevice, OfflineQueueEntry, Receipt, SubmissionAttempt};
use crate::db::repository::{
    DeviceRepository, FiscalDayRepository, OfflineQueueRepository, ReceiptRepository,
};
use crate::fdms::{FdmsApi, ReceiptDto, StatusResponse, SubmitReceiptRequest};
use crate::fiscal_audit_log;
use fdms_cert::SignatureEngine;
use shared::types::QueueState;
use std::sync::Arc;

/// Maximum send attempts before escalating to the offline queue.
const MAX_SEND_ATTEMPTS: u32 = 3;
/// Base backoff between attempts, doubled each retry.
const RETRY_BACKOFF_MS: u64 = 250;

#[derive(Clone)]
pub struct SubmitDriver {
    api: Arc<dyn FdmsApi>,
    devices: DeviceRepository,
    receipts: ReceiptRepository,
    days: FiscalDayRepository,
    queue: OfflineQueueRepository,
    config: ConfigSource,
}

impl SubmitDriver {
    pub fn new(
        api: Arc<dyn FdmsApi>,
        devices: DeviceRepository,
        receipts: ReceiptRepository,
        days: FiscalDayRepository,
        queue: OfflineQueueRepository,
        config: ConfigSource,
    ) -> Self {
        Self {
            api,
            devices,
            receipts,
            days,
            queue,
            config,
        }
    }

    /// Submit one receipt. Must run inside the device's exclusive lock.
    pub async fn submit(&self, device: &FiscalDevice, draft: ReceiptDraft) -> FiscalResult<Receipt> {
        // Validating: configuration gate and server-side recomputation
        // precede every network call.
        let config = self.config.ensure_fresh(self.api.as_ref(), device.device_id).await?;
        let amounts = recompute::recompute(&draft)?;
        validate_against_config(&config, &draft.currency, &amounts.taxes)?;

        // Queued receipts reach the remote strictly in order. A new
        // submission never leapfrogs them with a remote-derived sequence
        // number; it joins the back of the queue instead.
        if !self.queue.pending(device.device_id).await?.is_empty() {
            tracing::info!(
                device_id = device.device_id,
                "Offline queue is non-empty, appending receipt for ordered replay"
            );
            return self.enqueue_offline(device, &draft, amounts).await;
        }

        let status = match self.api.get_status(device.device_id).await {
            Ok(status) => status,
            Err(e) if e.is_network() => {
                tracing::warn!(
                    device_id = device.device_id,
                    error = %e,
                    "Fiscal service unreachable, queueing receipt offline"
                );
                return self.enqueue_offline(device, &draft, amounts).await;
            }
            Err(e) => return Err(e.into()),
        };
        self.sync_remote_day_state(device, &status).await?;

        if !status.fiscal_day_status.accepts_receipts() {
            return Err(FiscalError::Validation(format!(
                "Fiscal day does not accept receipts in state {:?}",
                status.fiscal_day_status
            )));
        }
        let fiscal_day_no = status.last_fiscal_day_no.ok_or_else(|| {
            FiscalError::Validation("Remote service reports no fiscal day".to_string())
        })?;

        let remote_last = status.last_receipt_global_no.unwrap_or(0);
        chain::check_alignment(device.last_receipt_global_no, remote_last)?;
        let next_global_no = remote_last + 1;

        // Duplicate detection: an already confirmed receipt is returned
        // unchanged, never resubmitted. An unconfirmed holder of the
        // number aborts; every sequence number maps to one receipt.
        if let Some(existing) = self
            .receipts
            .find_by_global_no(device.device_id, next_global_no)
            .await?
        {
            if existing.is_fiscalized() {
                tracing::info!(
                    device_id = device.device_id,
                    receipt_global_no = next_global_no,
                    "Receipt already confirmed for this sequence number"
                );
                return Ok(existing);
            }
            return Err(FiscalError::Validation(format!(
                "Sequence number {} is held by an unconfirmed receipt",
                next_global_no
            )));
        }
        if let Some(existing) = self
            .receipts
            .find_confirmed_invoice(device.device_id, fiscal_day_no, &draft.invoice_no)
            .await?
        {
            tracing::info!(
                device_id = device.device_id,
                invoice_no = %draft.invoice_no,
                "Document already fiscalized in this fiscal day"
            );
            return Ok(existing);
        }

        // Signing
        let last = self
            .receipts
            .last_in_day(device.device_id, fiscal_day_no)
            .await?;
        let chain_state = ChainState::from_last(last.as_ref());
        let mut receipt =
            self.build_signed_receipt(device, &draft, &amounts, fiscal_day_no, next_global_no, &chain_state)?;

        // Sending, with bounded backoff on network-class failures only.
        let request = SubmitReceiptRequest {
            receipt: ReceiptDto::from_receipt(&receipt),
        };
        for attempt in 1..=MAX_SEND_ATTEMPTS {
            match self.api.submit_receipt(device.device_id, &request).await {
                Ok(response) => {
                    // Verifying → Completed
                    self.record_attempt(device.device_id, next_global_no, true, None)
                        .await?;
                    receipt.remote_id = Some(response.receipt_id);
                    receipt.server_signature = response.receipt_server_signature;
                    let persisted = self.receipts.create(receipt).await?;
                    self.devices
                        .update_sequence(device.device_id, next_global_no, fiscal_day_no)
                        .await?;
                    fiscal_audit_log!(
                        device.device_id,
                        "submit_receipt",
                        next_global_no,
                        persisted.digest.as_str()
                    );
                    return Ok(persisted);
                }
                Err(e) if e.is_network() => {
                    self.record_attempt(
                        device.device_id,
                        next_global_no,
                        false,
                        Some(e.to_string()),
                    )
                    .await?;
                    tracing::warn!(
                        device_id = device.device_id,
                        receipt_global_no = next_global_no,
                        attempt,
                        error = %e,
                        "Submission attempt failed on network error"
                    );
                    if attempt < MAX_SEND_ATTEMPTS {
                        tokio::time::sleep(std::time::Duration::from_millis(
                            RETRY_BACKOFF_MS << (attempt - 1),
                        ))
                        .await;
                        // Resync before retrying; the remote may have
                        // registered the receipt despite the failure.
                        if let Ok(resync) = self.api.get_status(device.device_id).await
                            && resync.last_receipt_global_no.unwrap_or(0) >= next_global_no
                        {
                            receipt.remote_id = None;
                            let persisted = self.receipts.create(receipt).await?;
                            let entry = self.queue_entry(&persisted);
                            self.queue.enqueue(entry).await?;
                            tracing::warn!(
                                device_id = device.device_id,
                                receipt_global_no = next_global_no,
                                "Remote sequence advanced during retry; queued for reconciliation"
                            );
                            return Ok(persisted);
                        }
                    }
                }
                Err(e) => {
                    self.record_attempt(
                        device.device_id,
                        next_global_no,
                        false,
                        Some(e.to_string()),
                    )
                    .await?;
                    return Err(e.into());
                }
            }
        }

        // Network exhaustion: persist and queue rather than failing.
        let persisted = self.receipts.create(receipt).await?;
        let entry = self.queue_entry(&persisted);
        self.queue.enqueue(entry).await?;
        tracing::warn!(
            device_id = device.device_id,
            receipt_global_no = next_global_no,
            "Submission retries exhausted, receipt queued offline"
        );
        Ok(persisted)
    }

    /// Offline path: the remote status is unreachable, so the sequence
    /// number is derived locally from the last confirmed and last queued
    /// numbers, and the receipt is signed and queued for ordered replay.
    async fn enqueue_offline(
        &self,
        device: &FiscalDevice,
        draft: &ReceiptDraft,
        amounts: RecomputedAmounts,
    ) -> FiscalResult<Receipt> {
        let day = self
            .days
            .find_latest(device.device_id)
            .await?
            .filter(|d| d.status.accepts_receipts())
            .ok_or_else(|| {
                FiscalError::Validation("No open fiscal day for offline receipt".to_string())
            })?;

        let confirmed = device.last_receipt_global_no.unwrap_or(0);
        let queued = self
            .queue
            .max_global_no(device.device_id)
            .await?
            .unwrap_or(0);
        let next_global_no = confirmed.max(queued) + 1;

        let last = self
            .receipts
            .last_in_day(device.device_id, day.fiscal_day_no)
            .await?;
        let chain_state = ChainState::from_last(last.as_ref());
        let receipt = self.build_signed_receipt(
            device,
            draft,
            &amounts,
            day.fiscal_day_no,
            next_global_no,
            &chain_state,
        )?;

        let persisted = self.receipts.create(receipt).await?;
        let entry = self.queue_entry(&persisted);
        self.queue.enqueue(entry).await?;
        fiscal_audit_log!(
            device.device_id,
            "queue_offline",
            next_global_no,
            persisted.digest.as_str()
        );
        Ok(persisted)
    }

    /// Build the canonical string, sign it, and assemble the receipt
    /// record. No persistence happens here.
    fn build_signed_receipt(
        &self,
        device: &FiscalDevice,
        draft: &ReceiptDraft,
        amounts: &RecomputedAmounts,
        fiscal_day_no: i32,
        receipt_global_no: i64,
        chain_state: &ChainState,
    ) -> FiscalResult<Receipt> {
        let canonical = encode_receipt(&ReceiptFields {
            device_id: device.device_id,
            document_type: draft.document_type,
            currency: &draft.currency,
            receipt_global_no,
            receipt_date: draft.receipt_date,
            total: amounts.total,
            taxes: &amounts.taxes,
            previous_hash: chain_state.previous_hash(),
        });
        let engine = SignatureEngine::new(&device.certificate_pem, &device.private_key_pem)?;
        let signed = engine.sign(&canonical)?;

        Ok(Receipt {
            id: None,
            device_id: device.device_id,
            fiscal_day_no,
            receipt_global_no,
            receipt_counter: chain_state.next_counter(),
            document_type: draft.document_type,
            currency: draft.currency.to_uppercase(),
            invoice_no: draft.invoice_no.clone(),
            receipt_date: draft.receipt_date,
            lines: amounts.lines.clone(),
            taxes: amounts.taxes.clone(),
            payments: draft.payments.clone(),
            lines_tax_inclusive: draft.lines_tax_inclusive,
            total: amounts.total,
            canonical_string: canonical,
            digest: signed.hash,
            signature: signed.signature,
            server_signature: None,
            remote_id: None,
            adjustment: draft.adjustment.clone(),
            credit_status: Default::default(),
            credited_total: Default::default(),
            debited_total: Default::default(),
            created_at: shared::util::now_millis(),
        })
    }

    /// Persist any fiscal-day transition the remote status reveals.
    pub(crate) async fn sync_remote_day_state(
        &self,
        device: &FiscalDevice,
        status: &StatusResponse,
    ) -> FiscalResult<()> {
        if device.fiscal_day_status != Some(status.fiscal_day_status) {
            self.devices
                .update_day_status(device.device_id, status.fiscal_day_status)
                .await?;
            if let Some(day_no) = status.last_fiscal_day_no
                && self.days.find(device.device_id, day_no).await?.is_some()
            {
                let closed_at = (!status.fiscal_day_status.accepts_receipts())
                    .then(shared::util::now_millis);
                self.days
                    .set_status(
                        device.device_id,
                        day_no,
                        status.fiscal_day_status,
                        closed_at,
                        status.fiscal_day_closing_error_code.clone(),
                    )
                    .await?;
            }
            tracing::info!(
                device_id = device.device_id,
                status = ?status.fiscal_day_status,
                "Synchronized fiscal day state from remote"
            );
        }
        Ok(())
    }

    fn queue_entry(&self, receipt: &Receipt) -> OfflineQueueEntry {
        let now = shared::util::now_millis();
        OfflineQueueEntry {
            id: None,
            device_id: receipt.device_id,
            receipt_global_no: receipt.receipt_global_no,
            fiscal_day_no: receipt.fiscal_day_no,
            state: QueueState::Queued,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
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
