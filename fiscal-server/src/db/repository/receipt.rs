//! Receipt Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::Receipt;
use rust_decimal::Decimal;
use shared::types::CreditStatus;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const TABLE: &str = "receipt";

#[derive(Clone)]
pub struct ReceiptRepository {
    base: BaseRepository,
}

impl ReceiptRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, receipt: Receipt) -> RepoResult<Receipt> {
        let created: Option<Receipt> = self.base.db().create(TABLE).content(receipt).await?;
        created.ok_or_else(|| RepoError::Database("Failed to persist receipt".to_string()))
    }

    pub async fn find_by_global_no(
        &self,
        device_id: i64,
        receipt_global_no: i64,
    ) -> RepoResult<Option<Receipt>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM receipt \
                 WHERE device_id = $device_id AND receipt_global_no = $global_no \
                 LIMIT 1",
            )
            .bind(("device_id", device_id))
            .bind(("global_no", receipt_global_no))
            .await?;
        let receipts: Vec<Receipt> = result.take(0)?;
        Ok(receipts.into_iter().next())
    }

    /// A remotely confirmed receipt for the same back-office document
    /// number in the same fiscal day, if one exists.
    pub async fn find_confirmed_invoice(
        &self,
        device_id: i64,
        fiscal_day_no: i32,
        invoice_no: &str,
    ) -> RepoResult<Option<Receipt>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM receipt \
                 WHERE device_id = $device_id \
                 AND fiscal_day_no = $day_no \
                 AND invoice_no = $invoice_no \
                 AND remote_id != NONE AND remote_id != 0 \
                 LIMIT 1",
            )
            .bind(("device_id", device_id))
            .bind(("day_no", fiscal_day_no))
            .bind(("invoice_no", invoice_no.to_string()))
            .await?;
        let receipts: Vec<Receipt> = result.take(0)?;
        Ok(receipts.into_iter().next())
    }

    /// Last receipt of a fiscal day by per-day counter; the chain tail.
    pub async fn last_in_day(
        &self,
        device_id: i64,
        fiscal_day_no: i32,
    ) -> RepoResult<Option<Receipt>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM receipt \
                 WHERE device_id = $device_id AND fiscal_day_no = $day_no \
                 ORDER BY receipt_counter DESC LIMIT 1",
            )
            .bind(("device_id", device_id))
            .bind(("day_no", fiscal_day_no))
            .await?;
        let receipts: Vec<Receipt> = result.take(0)?;
        Ok(receipts.into_iter().next())
    }

    /// Highest sequence number persisted locally, confirmed or queued.
    pub async fn last_by_global_no(&self, device_id: i64) -> RepoResult<Option<Receipt>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM receipt WHERE device_id = $device_id \
                 ORDER BY receipt_global_no DESC LIMIT 1",
            )
            .bind(("device_id", device_id))
            .await?;
        let receipts: Vec<Receipt> = result.take(0)?;
        Ok(receipts.into_iter().next())
    }

    pub async fn list_day(&self, device_id: i64, fiscal_day_no: i32) -> RepoResult<Vec<Receipt>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM receipt \
                 WHERE device_id = $device_id AND fiscal_day_no = $day_no \
                 ORDER BY receipt_counter ASC",
            )
            .bind(("device_id", device_id))
            .bind(("day_no", fiscal_day_no))
            .await?;
        let receipts: Vec<Receipt> = result.take(0)?;
        Ok(receipts)
    }

    /// Every receipt of a device in audit order (fiscal day, counter).
    pub async fn list_all(&self, device_id: i64) -> RepoResult<Vec<Receipt>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM receipt WHERE device_id = $device_id \
                 ORDER BY fiscal_day_no ASC, receipt_counter ASC",
            )
            .bind(("device_id", device_id))
            .await?;
        let receipts: Vec<Receipt> = result.take(0)?;
        Ok(receipts)
    }

    /// Record remote confirmation. The only mutation a receipt ever
    /// sees after creation.
    pub async fn mark_fiscalized(
        &self,
        id: &RecordId,
        remote_id: i64,
        server_signature: Option<serde_json::Value>,
    ) -> RepoResult<()> {
        self.base
            .db()
            .query("UPDATE $id SET remote_id = $remote_id, server_signature = $signature")
            .bind(("id", id.clone()))
            .bind(("remote_id", remote_id))
            .bind(("signature", server_signature))
            .await?;
        Ok(())
    }

    /// Update the invoice-side adjustment tracking after a confirmed
    /// credit or debit note.
    pub async fn update_adjustment_totals(
        &self,
        id: &RecordId,
        credited_total: Decimal,
        debited_total: Decimal,
        credit_status: CreditStatus,
    ) -> RepoResult<()> {
        self.base
            .db()
            .query(
                "UPDATE $id SET credited_total = $credited, \
                 debited_total = $debited, credit_status = $status",
            )
            .bind(("id", id.clone()))
            .bind(("credited", credited_total))
            .bind(("debited", debited_total))
            .bind(("status", credit_status))
            .await?;
        Ok(())
    }
}
