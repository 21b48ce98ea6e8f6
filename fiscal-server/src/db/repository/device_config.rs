//! Device Configuration Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::DeviceConfig;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const TABLE: &str = "device_config";

#[derive(Clone)]
pub struct DeviceConfigRepository {
    base: BaseRepository,
}

impl DeviceConfigRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Replace the stored snapshot for a device.
    pub async fn upsert(&self, config: DeviceConfig) -> RepoResult<DeviceConfig> {
        self.base
            .db()
            .query("DELETE device_config WHERE device_id = $device_id")
            .bind(("device_id", config.device_id))
            .await?;
        let created: Option<DeviceConfig> = self.base.db().create(TABLE).content(config).await?;
        created.ok_or_else(|| RepoError::Database("Failed to store device config".to_string()))
    }

    pub async fn find_by_device(&self, device_id: i64) -> RepoResult<Option<DeviceConfig>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM device_config WHERE device_id = $device_id LIMIT 1")
            .bind(("device_id", device_id))
            .await?;
        let configs: Vec<DeviceConfig> = result.take(0)?;
        Ok(configs.into_iter().next())
    }
}
