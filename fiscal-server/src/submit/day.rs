//! Fiscal day lifecycle
//!
//! Opening and closing are online-only operations. Closing is
//! asynchronous on the remote side: the close submission moves the day
//! to `CloseInitiated`, and the final `Closed` or `CloseFailed` state is
//! observed by polling the remote status.

use crate::canonical::encode_day_report;
use crate::common::error::{FiscalError, FiscalResult};
use crate::counters::aggregate_day_counters;
use crate::db::models::{FiscalDay, FiscalDevice};
use crate::db::repository::{DeviceRepository, FiscalDayRepository, ReceiptRepository};
use crate::fdms::{CloseDayRequest, CounterDto, FdmsApi, OpenDayRequest, SignatureDto};
use crate::fiscal_audit_log;
use fdms_cert::SignatureEngine;
use shared::types::FiscalDayStatus;
use std::sync::Arc;

/// How many times the remote status is polled after a close submission
/// before giving up and leaving the day in `CloseInitiated`.
const CLOSE_POLL_ATTEMPTS: u32 = 10;
const CLOSE_POLL_INTERVAL_MS: u64 = 2_000;

#[derive(Clone)]
pub struct DayFlow {
    api: Arc<dyn FdmsApi>,
    devices: DeviceRepository,
    receipts: ReceiptRepository,
    days: FiscalDayRepository,
}

impl DayFlow {
    pub fn new(
        api: Arc<dyn FdmsApi>,
        devices: DeviceRepository,
        receipts: ReceiptRepository,
        days: FiscalDayRepository,
    ) -> Self {
        Self {
            api,
            devices,
            receipts,
            days,
        }
    }

    /// Open the next fiscal day. Idempotent: when the remote already has
    /// a day accepting receipts, the matching local record is returned
    /// (and created first if this device store has never seen it).
    pub async fn open_day(&self, device: &FiscalDevice) -> FiscalResult<FiscalDay> {
        let status = self.api.get_status(device.device_id).await?;

        if status.fiscal_day_status.accepts_receipts() {
            let day_no = status.last_fiscal_day_no.ok_or_else(|| {
                FiscalError::Validation(
                    "Remote day is open but no day number was reported".to_string(),
                )
            })?;
            if let Some(day) = self.days.find(device.device_id, day_no).await? {
                return Ok(day);
            }
            tracing::warn!(
                device_id = device.device_id,
                fiscal_day_no = day_no,
                "Remote day open but unknown locally, recreating record"
            );
            let day = self.persist_opened_day(device, day_no).await?;
            return Ok(day);
        }

        let day_no = status.last_fiscal_day_no.unwrap_or(0) + 1;
        let opened = shared::util::now_naive();
        let response = self
            .api
            .open_day(
                device.device_id,
                &OpenDayRequest {
                    fiscal_day_no: Some(day_no),
                    fiscal_day_opened: shared::util::format_receipt_date(&opened),
                },
            )
            .await?;

        let day = self.persist_opened_day(device, response.fiscal_day_no).await?;
        fiscal_audit_log!(
            device.device_id,
            "open_day",
            0i64,
            format!("fiscal_day_no={}", day.fiscal_day_no).as_str()
        );
        Ok(day)
    }

    async fn persist_opened_day(
        &self,
        device: &FiscalDevice,
        fiscal_day_no: i32,
    ) -> FiscalResult<FiscalDay> {
        let now = shared::util::now_naive();
        let day = self
            .days
            .create(FiscalDay {
                id: None,
                device_id: device.device_id,
                fiscal_day_no,
                status: FiscalDayStatus::Opened,
                opened_date: now.date(),
                opened_at: shared::util::now_millis(),
                closed_at: None,
                closing_error_code: None,
                counters: Vec::new(),
                close_canonical: None,
                close_digest: None,
                close_signature: None,
            })
            .await?;
        self.devices
            .update_day_status(device.device_id, FiscalDayStatus::Opened)
            .await?;
        self.devices
            .update_sequence(
                device.device_id,
                device.last_receipt_global_no.unwrap_or(0),
                fiscal_day_no,
            )
            .await?;
        Ok(day)
    }

    /// Close a fiscal day: aggregate counters over its receipts, sign
    /// the day report, submit, and poll the remote until the close
    /// resolves. Returns the remote operation id.
    ///
    /// When polling runs out the day stays `CloseInitiated`; a later
    /// status resync settles it.
    pub async fn close_day(&self, device: &FiscalDevice, fiscal_day_no: i32) -> FiscalResult<String> {
        let day = self
            .days
            .find(device.device_id, fiscal_day_no)
            .await?
            .ok_or_else(|| {
                FiscalError::Validation(format!("Unknown fiscal day {}", fiscal_day_no))
            })?;
        match day.status {
            FiscalDayStatus::Closed => {
                return Err(FiscalError::Validation(format!(
                    "Fiscal day {} is already closed",
                    fiscal_day_no
                )));
            }
            FiscalDayStatus::Opened
            | FiscalDayStatus::CloseFailed
            | FiscalDayStatus::CloseInitiated => {}
        }

        let receipts = self.receipts.list_day(device.device_id, fiscal_day_no).await?;
        let counters = aggregate_day_counters(&receipts)?;
        let canonical = encode_day_report(device.device_id, fiscal_day_no, day.opened_date, &counters);

        let engine = SignatureEngine::new(&device.certificate_pem, &device.private_key_pem)?;
        let signed = engine.sign(&canonical)?;

        let receipt_counter = receipts.iter().filter(|r| r.is_fiscalized()).count() as i32;
        let response = self
            .api
            .close_day(
                device.device_id,
                &CloseDayRequest {
                    fiscal_day_no,
                    fiscal_day_counters: counters.iter().map(CounterDto::from).collect(),
                    fiscal_day_device_signature: SignatureDto {
                        hash: signed.hash.clone(),
                        signature: signed.signature.clone(),
                    },
                    receipt_counter,
                },
            )
            .await?;

        self.days
            .record_close_submission(
                device.device_id,
                fiscal_day_no,
                counters,
                canonical,
                signed.hash,
                signed.signature,
            )
            .await?;
        self.devices
            .update_day_status(device.device_id, FiscalDayStatus::CloseInitiated)
            .await?;
        fiscal_audit_log!(
            device.device_id,
            "close_day",
            0i64,
            format!("fiscal_day_no={}", fiscal_day_no).as_str()
        );

        for _ in 0..CLOSE_POLL_ATTEMPTS {
            tokio::time::sleep(std::time::Duration::from_millis(CLOSE_POLL_INTERVAL_MS)).await;
            let status = match self.api.get_status(device.device_id).await {
                Ok(s) => s,
                // Transient failure while polling; the day stays
                // CloseInitiated and the next poll retries.
                Err(e) if e.is_network() => {
                    tracing::warn!(device_id = device.device_id, error = %e, "Close poll failed");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            match status.fiscal_day_status {
                FiscalDayStatus::Closed => {
                    self.days
                        .set_status(
                            device.device_id,
                            fiscal_day_no,
                            FiscalDayStatus::Closed,
                            Some(shared::util::now_millis()),
                            None,
                        )
                        .await?;
                    self.devices
                        .update_day_status(device.device_id, FiscalDayStatus::Closed)
                        .await?;
                    return Ok(response.operation_id);
                }
                FiscalDayStatus::CloseFailed => {
                    let code = status.fiscal_day_closing_error_code.clone();
                    self.days
                        .set_status(
                            device.device_id,
                            fiscal_day_no,
                            FiscalDayStatus::CloseFailed,
                            None,
                            code.clone(),
                        )
                        .await?;
                    self.devices
                        .update_day_status(device.device_id, FiscalDayStatus::CloseFailed)
                        .await?;
                    return Err(FiscalError::Rejected(format!(
                        "Day close failed remotely: {}",
                        code.unwrap_or_else(|| "no error code".to_string())
                    )));
                }
                _ => {}
            }
        }

        tracing::warn!(
            device_id = device.device_id,
            fiscal_day_no,
            "Day close still pending after polling, leaving CloseInitiated"
        );
        Ok(response.operation_id)
    }
}
