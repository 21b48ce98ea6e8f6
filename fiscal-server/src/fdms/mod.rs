//! Remote fiscal service interface
//!
//! The tax authority's device API as consumed here: status, config,
//! receipt submission and day open/close. The trait keeps the driver
//! testable against a mock; the reqwest implementation speaks mutual
//! TLS with the device certificate.

pub mod client;
pub mod types;

pub use client::FdmsClient;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Remote service error, classified for retry policy: network-class
/// failures are retried and may escalate to the offline queue,
/// rejections never are.
#[derive(Debug, Error)]
pub enum FdmsError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl FdmsError {
    pub fn is_network(&self) -> bool {
        matches!(self, FdmsError::Network(_))
    }
}

impl From<reqwest::Error> for FdmsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FdmsError::Protocol(e.to_string())
        } else {
            FdmsError::Network(e.to_string())
        }
    }
}

pub type FdmsResult<T> = Result<T, FdmsError>;

/// Device-facing operations of the remote fiscal service.
#[async_trait]
pub trait FdmsApi: Send + Sync {
    async fn get_status(&self, device_id: i64) -> FdmsResult<StatusResponse>;

    async fn get_config(&self, device_id: i64) -> FdmsResult<ConfigResponse>;

    async fn submit_receipt(
        &self,
        device_id: i64,
        request: &SubmitReceiptRequest,
    ) -> FdmsResult<SubmitReceiptResponse>;

    async fn open_day(&self, device_id: i64, request: &OpenDayRequest)
    -> FdmsResult<OpenDayResponse>;

    async fn close_day(
        &self,
        device_id: i64,
        request: &CloseDayRequest,
    ) -> FdmsResult<CloseDayResponse>;
}
