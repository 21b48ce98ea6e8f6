//! Offline Queue Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{OfflineQueueEntry, SubmissionAttempt};
use shared::types::QueueState;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const TABLE: &str = "offline_queue";
const ATTEMPT_TABLE: &str = "submission_attempt";

#[derive(Clone)]
pub struct OfflineQueueRepository {
    base: BaseRepository,
}

impl OfflineQueueRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn enqueue(&self, entry: OfflineQueueEntry) -> RepoResult<OfflineQueueEntry> {
        let created: Option<OfflineQueueEntry> =
            self.base.db().create(TABLE).content(entry).await?;
        created.ok_or_else(|| RepoError::Database("Failed to enqueue receipt".to_string()))
    }

    /// Entries still waiting for replay, in strict replay order.
    pub async fn pending(&self, device_id: i64) -> RepoResult<Vec<OfflineQueueEntry>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM offline_queue \
                 WHERE device_id = $device_id AND state = $state \
                 ORDER BY receipt_global_no ASC, fiscal_day_no ASC, created_at ASC",
            )
            .bind(("device_id", device_id))
            .bind(("state", QueueState::Queued))
            .await?;
        let entries: Vec<OfflineQueueEntry> = result.take(0)?;
        Ok(entries)
    }

    /// Highest sequence number ever queued for a device, regardless of
    /// entry state. Feeds local sequence derivation while offline.
    pub async fn max_global_no(&self, device_id: i64) -> RepoResult<Option<i64>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM offline_queue WHERE device_id = $device_id \
                 ORDER BY receipt_global_no DESC LIMIT 1",
            )
            .bind(("device_id", device_id))
            .await?;
        let entries: Vec<OfflineQueueEntry> = result.take(0)?;
        Ok(entries.into_iter().next().map(|e| e.receipt_global_no))
    }

    pub async fn set_state(
        &self,
        id: &RecordId,
        state: QueueState,
        failure_reason: Option<String>,
    ) -> RepoResult<()> {
        self.base
            .db()
            .query(
                "UPDATE $id SET state = $state, \
                 failure_reason = $reason, updated_at = $now",
            )
            .bind(("id", id.clone()))
            .bind(("state", state))
            .bind(("reason", failure_reason))
            .bind(("now", shared::util::now_millis()))
            .await?;
        Ok(())
    }

    pub async fn record_attempt(&self, attempt: SubmissionAttempt) -> RepoResult<()> {
        let _: Option<SubmissionAttempt> =
            self.base.db().create(ATTEMPT_TABLE).content(attempt).await?;
        Ok(())
    }

    pub async fn attempts_for(
        &self,
        device_id: i64,
        receipt_global_no: i64,
    ) -> RepoResult<Vec<SubmissionAttempt>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM submission_attempt \
                 WHERE device_id = $device_id AND receipt_global_no = $global_no \
                 ORDER BY attempted_at ASC",
            )
            .bind(("device_id", device_id))
            .bind(("global_no", receipt_global_no))
            .await?;
        let attempts: Vec<SubmissionAttempt> = result.take(0)?;
        Ok(attempts)
    }
}
