//! Service facade
//!
//! Single entry point for callers. Every mutating operation runs inside
//! a per-device async lock, so receipts, day transitions and replay for
//! one device are strictly serialized while devices proceed in
//! parallel.

use crate::audit::{AuditReport, IntegrityAuditor};
use crate::common::error::{FiscalError, FiscalResult};
use crate::config::ConfigSource;
use crate::db::models::{FiscalDay, FiscalDevice, Receipt, ReceiptLine, ReceiptPayment};
use crate::db::repository::{
    DeviceConfigRepository, DeviceRepository, FiscalDayRepository, OfflineQueueRepository,
    ReceiptRepository,
};
use crate::fdms::FdmsApi;
use crate::offline::{OfflineReplayer, ReplayReport};
use crate::submit::{DayFlow, ReceiptDraft, SubmitDriver};
use dashmap::DashMap;
use rust_decimal::Decimal;
use shared::types::{CreditStatus, DocumentType, MoneyType};
use std::sync::Arc;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use tokio::sync::Mutex;

pub struct FiscalService {
    devices: DeviceRepository,
    receipts: ReceiptRepository,
    driver: SubmitDriver,
    day_flow: DayFlow,
    replayer: OfflineReplayer,
    auditor: IntegrityAuditor,
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl FiscalService {
    pub fn new(db: Surreal<Db>, api: Arc<dyn FdmsApi>) -> Self {
        let devices = DeviceRepository::new(db.clone());
        let receipts = ReceiptRepository::new(db.clone());
        let days = FiscalDayRepository::new(db.clone());
        let queue = OfflineQueueRepository::new(db.clone());
        let config = ConfigSource::new(DeviceConfigRepository::new(db));

        Self {
            driver: SubmitDriver::new(
                api.clone(),
                devices.clone(),
                receipts.clone(),
                days.clone(),
                queue.clone(),
                config,
            ),
            day_flow: DayFlow::new(api.clone(), devices.clone(), receipts.clone(), days.clone()),
            replayer: OfflineReplayer::new(api, devices.clone(), receipts.clone(), queue),
            auditor: IntegrityAuditor::new(receipts.clone(), days),
            devices,
            receipts,
            locks: DashMap::new(),
        }
    }

    /// Register a device with its credential pair.
    pub async fn register_device(&self, device: FiscalDevice) -> FiscalResult<FiscalDevice> {
        Ok(self.devices.create(device).await?)
    }

    /// Submit one sales document as a fiscal receipt. Idempotent: a
    /// resubmission after a lost acknowledgement returns the already
    /// confirmed receipt.
    pub async fn submit_receipt(
        &self,
        device_id: i64,
        draft: ReceiptDraft,
    ) -> FiscalResult<Receipt> {
        let lock = self.device_lock(device_id);
        let _guard = lock.lock().await;
        let device = self.device(device_id).await?;
        self.driver.submit(&device, draft).await
    }

    pub async fn open_day(&self, device_id: i64) -> FiscalResult<FiscalDay> {
        let lock = self.device_lock(device_id);
        let _guard = lock.lock().await;
        let device = self.device(device_id).await?;
        self.day_flow.open_day(&device).await
    }

    /// Close a fiscal day; returns the remote operation id.
    pub async fn close_day(&self, device_id: i64, fiscal_day_no: i32) -> FiscalResult<String> {
        let lock = self.device_lock(device_id);
        let _guard = lock.lock().await;
        let device = self.device(device_id).await?;
        self.day_flow.close_day(&device, fiscal_day_no).await
    }

    /// Issue a credit note for part or all of a fiscalized invoice. The
    /// amount is allocated proportionally across the original's tax
    /// bands and refunded through the original's payment method.
    pub async fn create_credit_note(
        &self,
        device_id: i64,
        original_global_no: i64,
        amount: Decimal,
        reason: &str,
    ) -> FiscalResult<Receipt> {
        let lock = self.device_lock(device_id);
        let _guard = lock.lock().await;
        let device = self.device(device_id).await?;
        let original = self.original(device_id, original_global_no).await?;

        let now = shared::util::now_naive();
        let parts = crate::allocation::build_credit_note(&original, amount, reason, now)?;
        let draft = ReceiptDraft {
            document_type: DocumentType::CreditNote,
            currency: original.currency.clone(),
            invoice_no: format!("CN-{}-{}", original.invoice_no, shared::util::now_millis()),
            receipt_date: now,
            lines: parts.lines,
            payments: vec![ReceiptPayment {
                money_type: refund_method(&original),
                amount: parts.total,
            }],
            lines_tax_inclusive: true,
            taxes: Some(parts.taxes),
            adjustment: Some(parts.reference),
        };
        let note = self.driver.submit(&device, draft).await?;

        // Remaining balance shrinks as soon as the note exists, queued
        // or confirmed, so a second credit cannot overdraw the invoice.
        let credited = original.credited_total + amount;
        self.set_adjustment_totals(&original, credited, original.debited_total)
            .await?;
        Ok(note)
    }

    /// Issue a debit note adding new charges against a fiscalized
    /// invoice. Tax bands are carried over from the original, split
    /// proportionally when it had more than one.
    pub async fn create_debit_note(
        &self,
        device_id: i64,
        original_global_no: i64,
        lines: Vec<ReceiptLine>,
        reason: &str,
    ) -> FiscalResult<Receipt> {
        let lock = self.device_lock(device_id);
        let _guard = lock.lock().await;
        let device = self.device(device_id).await?;
        let original = self.original(device_id, original_global_no).await?;

        let now = shared::util::now_naive();
        let parts = crate::allocation::build_debit_note(&original, lines, reason, now)?;
        let total = parts.total;
        let draft = ReceiptDraft {
            document_type: DocumentType::DebitNote,
            currency: original.currency.clone(),
            invoice_no: format!("DN-{}-{}", original.invoice_no, shared::util::now_millis()),
            receipt_date: now,
            lines: parts.lines,
            payments: vec![ReceiptPayment {
                money_type: refund_method(&original),
                amount: total,
            }],
            lines_tax_inclusive: true,
            taxes: Some(parts.taxes),
            adjustment: Some(parts.reference),
        };
        let note = self.driver.submit(&device, draft).await?;

        let debited = original.debited_total + total;
        self.set_adjustment_totals(&original, original.credited_total, debited)
            .await?;
        Ok(note)
    }

    /// Replay the offline queue for one device.
    pub async fn replay_offline(&self, device_id: i64) -> FiscalResult<ReplayReport> {
        let lock = self.device_lock(device_id);
        let _guard = lock.lock().await;
        self.replayer.replay(device_id).await
    }

    /// Audit one device's receipt chain and day counters.
    pub async fn audit_device(&self, device_id: i64) -> FiscalResult<AuditReport> {
        let device = self.device(device_id).await?;
        self.auditor.audit_device(&device).await
    }

    /// Audit every registered device and fold the findings together.
    pub async fn run_integrity_audit(&self) -> FiscalResult<AuditReport> {
        let mut merged = AuditReport::default();
        for device in self.devices.find_all().await? {
            merged.merge(self.auditor.audit_device(&device).await?);
        }
        Ok(merged)
    }

    fn device_lock(&self, device_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry(device_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn device(&self, device_id: i64) -> FiscalResult<FiscalDevice> {
        self.devices
            .find_by_device_id(device_id)
            .await?
            .ok_or_else(|| FiscalError::Validation(format!("Unknown device {}", device_id)))
    }

    async fn original(&self, device_id: i64, receipt_global_no: i64) -> FiscalResult<Receipt> {
        self.receipts
            .find_by_global_no(device_id, receipt_global_no)
            .await?
            .ok_or_else(|| {
                FiscalError::Validation(format!("Unknown original receipt {}", receipt_global_no))
            })
    }

    async fn set_adjustment_totals(
        &self,
        original: &Receipt,
        credited: Decimal,
        debited: Decimal,
    ) -> FiscalResult<()> {
        let id = original
            .id
            .clone()
            .ok_or_else(|| FiscalError::Internal("Original receipt without id".to_string()))?;
        let status = derive_credit_status(original.total, credited, debited);
        self.receipts
            .update_adjustment_totals(&id, credited, debited, status)
            .await?;
        Ok(())
    }
}

/// Payment method for an adjustment: the original's first payment
/// method, falling back to cash.
fn refund_method(original: &Receipt) -> MoneyType {
    original
        .payments
        .first()
        .map(|p| p.money_type)
        .unwrap_or(MoneyType::Cash)
}

fn derive_credit_status(total: Decimal, credited: Decimal, debited: Decimal) -> CreditStatus {
    if credited >= total {
        CreditStatus::FullyCredited
    } else if credited > Decimal::ZERO {
        CreditStatus::PartiallyCredited
    } else if debited > Decimal::ZERO {
        CreditStatus::AdjustedUp
    } else {
        CreditStatus::Issued
    }
}
