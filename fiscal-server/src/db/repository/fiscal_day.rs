//! Fiscal Day Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{DayCounter, FiscalDay};
use shared::types::FiscalDayStatus;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const TABLE: &str = "fiscal_day";

#[derive(Clone)]
pub struct FiscalDayRepository {
    base: BaseRepository,
}

impl FiscalDayRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, day: FiscalDay) -> RepoResult<FiscalDay> {
        if self.find(day.device_id, day.fiscal_day_no).await?.is_some() {
            return Err(RepoError::Duplicate(format!(
                "Fiscal day {} already exists for device {}",
                day.fiscal_day_no, day.device_id
            )));
        }
        let created: Option<FiscalDay> = self.base.db().create(TABLE).content(day).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create fiscal day".to_string()))
    }

    pub async fn find(&self, device_id: i64, fiscal_day_no: i32) -> RepoResult<Option<FiscalDay>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM fiscal_day \
                 WHERE device_id = $device_id AND fiscal_day_no = $day_no \
                 LIMIT 1",
            )
            .bind(("device_id", device_id))
            .bind(("day_no", fiscal_day_no))
            .await?;
        let days: Vec<FiscalDay> = result.take(0)?;
        Ok(days.into_iter().next())
    }

    /// Most recent fiscal day for a device, open or not.
    pub async fn find_latest(&self, device_id: i64) -> RepoResult<Option<FiscalDay>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM fiscal_day WHERE device_id = $device_id \
                 ORDER BY fiscal_day_no DESC LIMIT 1",
            )
            .bind(("device_id", device_id))
            .await?;
        let days: Vec<FiscalDay> = result.take(0)?;
        Ok(days.into_iter().next())
    }

    pub async fn list_all(&self, device_id: i64) -> RepoResult<Vec<FiscalDay>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM fiscal_day WHERE device_id = $device_id \
                 ORDER BY fiscal_day_no ASC",
            )
            .bind(("device_id", device_id))
            .await?;
        let days: Vec<FiscalDay> = result.take(0)?;
        Ok(days)
    }

    pub async fn set_status(
        &self,
        device_id: i64,
        fiscal_day_no: i32,
        status: FiscalDayStatus,
        closed_at: Option<i64>,
        closing_error_code: Option<String>,
    ) -> RepoResult<()> {
        self.base
            .db()
            .query(
                "UPDATE fiscal_day SET status = $status, \
                 closed_at = $closed_at, closing_error_code = $error_code \
                 WHERE device_id = $device_id AND fiscal_day_no = $day_no",
            )
            .bind(("device_id", device_id))
            .bind(("day_no", fiscal_day_no))
            .bind(("status", status))
            .bind(("closed_at", closed_at))
            .bind(("error_code", closing_error_code))
            .await?;
        Ok(())
    }

    /// Store what was submitted at close so the auditor can compare an
    /// independent counter rebuild against it.
    pub async fn record_close_submission(
        &self,
        device_id: i64,
        fiscal_day_no: i32,
        counters: Vec<DayCounter>,
        canonical: String,
        digest: String,
        signature: String,
    ) -> RepoResult<()> {
        self.base
            .db()
            .query(
                "UPDATE fiscal_day SET counters = $counters, \
                 close_canonical = $canonical, close_digest = $digest, \
                 close_signature = $signature, status = $status \
                 WHERE device_id = $device_id AND fiscal_day_no = $day_no",
            )
            .bind(("device_id", device_id))
            .bind(("day_no", fiscal_day_no))
            .bind(("counters", counters))
            .bind(("canonical", canonical))
            .bind(("digest", digest))
            .bind(("signature", signature))
            .bind(("status", FiscalDayStatus::CloseInitiated))
            .await?;
        Ok(())
    }
}
