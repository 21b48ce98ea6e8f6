//! Tax configuration source
//!
//! Persisted snapshots of the remote device configuration (currencies
//! and tax table) with a 24 h staleness window. Submission fails closed
//! when no fresh snapshot can be obtained.

use crate::common::error::{FiscalError, FiscalResult};
use crate::db::models::{DeviceConfig, TaxEntry, TaxLine};
use crate::db::repository::DeviceConfigRepository;
use crate::fdms::FdmsApi;
use shared::money::round2;

#[derive(Clone)]
pub struct ConfigSource {
    repo: DeviceConfigRepository,
}

impl ConfigSource {
    pub fn new(repo: DeviceConfigRepository) -> Self {
        Self { repo }
    }

    /// Return a fresh configuration snapshot, refetching from the
    /// remote service when the stored one is absent or stale. With no
    /// fresh snapshot and no reachable service this fails closed.
    pub async fn ensure_fresh(
        &self,
        api: &dyn FdmsApi,
        device_id: i64,
    ) -> FiscalResult<DeviceConfig> {
        let now = shared::util::now_millis();
        let stored = self.repo.find_by_device(device_id).await?;
        if let Some(cfg) = &stored
            && cfg.is_fresh(now)
        {
            return Ok(cfg.clone());
        }

        match api.get_config(device_id).await {
            Ok(resp) => {
                let config = DeviceConfig {
                    id: None,
                    device_id,
                    currencies: resp.currencies,
                    taxes: resp
                        .applicable_taxes
                        .into_iter()
                        .map(|t| TaxEntry {
                            tax_id: t.tax_id,
                            tax_code: t.tax_code,
                            tax_percent: t.tax_percent,
                        })
                        .collect(),
                    fetched_at: now,
                };
                tracing::info!(device_id, "Refreshed device tax configuration");
                Ok(self.repo.upsert(config).await?)
            }
            Err(e) => Err(FiscalError::Config(format!(
                "No fresh tax configuration and refetch failed: {}",
                e
            ))),
        }
    }
}

/// Validate a receipt's currency and tax bands against the snapshot.
pub fn validate_against_config(
    config: &DeviceConfig,
    currency: &str,
    taxes: &[TaxLine],
) -> FiscalResult<()> {
    if !config.allows_currency(currency) {
        return Err(FiscalError::Validation(format!(
            "Currency {} is not configured for this device",
            currency
        )));
    }
    for band in taxes {
        let entry = config.tax_by_id(band.tax_id).ok_or_else(|| {
            FiscalError::Validation(format!("Unknown tax id {}", band.tax_id))
        })?;
        let expected = entry.tax_percent.map(round2);
        let supplied = band.tax_percent.map(round2);
        if expected != supplied {
            return Err(FiscalError::Validation(format!(
                "Tax id {} percent mismatch: configured {:?}, supplied {:?}",
                band.tax_id, entry.tax_percent, band.tax_percent
            )));
        }
    }
    Ok(())
}
