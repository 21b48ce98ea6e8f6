//! Fiscal Device Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::FiscalDevice;
use shared::types::FiscalDayStatus;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const TABLE: &str = "fiscal_device";

#[derive(Clone)]
pub struct DeviceRepository {
    base: BaseRepository,
}

impl DeviceRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, device: FiscalDevice) -> RepoResult<FiscalDevice> {
        if self.find_by_device_id(device.device_id).await?.is_some() {
            return Err(RepoError::Duplicate(format!(
                "Device {} already registered",
                device.device_id
            )));
        }
        let created: Option<FiscalDevice> = self.base.db().create(TABLE).content(device).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create device".to_string()))
    }

    pub async fn find_by_device_id(&self, device_id: i64) -> RepoResult<Option<FiscalDevice>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM fiscal_device WHERE device_id = $device_id LIMIT 1")
            .bind(("device_id", device_id))
            .await?;

        let devices: Vec<FiscalDevice> = result.take(0)?;
        Ok(devices.into_iter().next())
    }

    pub async fn find_all(&self) -> RepoResult<Vec<FiscalDevice>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM fiscal_device ORDER BY device_id ASC")
            .await?;
        let devices: Vec<FiscalDevice> = result.take(0)?;
        Ok(devices)
    }

    /// Advance the confirmed sequence position. Only called from inside
    /// the device's exclusive lock scope.
    pub async fn update_sequence(
        &self,
        device_id: i64,
        last_receipt_global_no: i64,
        last_fiscal_day_no: i32,
    ) -> RepoResult<()> {
        self.base
            .db()
            .query(
                "UPDATE fiscal_device SET \
                 last_receipt_global_no = $global_no, \
                 last_fiscal_day_no = $day_no \
                 WHERE device_id = $device_id",
            )
            .bind(("device_id", device_id))
            .bind(("global_no", last_receipt_global_no))
            .bind(("day_no", last_fiscal_day_no))
            .await?;
        Ok(())
    }

    pub async fn update_day_status(
        &self,
        device_id: i64,
        status: FiscalDayStatus,
    ) -> RepoResult<()> {
        self.base
            .db()
            .query("UPDATE fiscal_device SET fiscal_day_status = $status WHERE device_id = $device_id")
            .bind(("device_id", device_id))
            .bind(("status", status))
            .await?;
        Ok(())
    }
}
