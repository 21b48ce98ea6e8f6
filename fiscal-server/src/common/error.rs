//! Caller-facing error taxonomy
//!
//! Every failure surfaces as a distinct named kind so UI/API layers can
//! react differently: prompt a resync, show a validation message, or
//! note that the receipt was queued offline.

use crate::db::repository::RepoError;
use crate::fdms::FdmsError;
use fdms_cert::CertError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FiscalError {
    /// Tax configuration absent or stale. Fails closed before any
    /// network call; never retried automatically.
    #[error("Tax configuration unavailable: {0}")]
    Config(String),

    /// Local receipt sequence disagrees with the remote service.
    /// Requires manual resynchronization; never auto-repaired by
    /// guessing a number.
    #[error("Receipt chain out of sync: local {local}, remote {remote}")]
    ChainOutOfSync { local: i64, remote: i64 },

    /// Rejected locally before any network call.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Cumulative credits would exceed the original invoice total.
    #[error("Credit exceeds remaining balance: {0}")]
    OverCredit(String),

    /// Transient connectivity failure. Retried with bounded backoff,
    /// then escalated to the offline queue.
    #[error("Network error: {0}")]
    Network(String),

    /// Remote service rejected the submission (authentication,
    /// certificate or payload). Never retried.
    #[error("Rejected by fiscal service: {0}")]
    Rejected(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Signing error: {0}")]
    Signing(String),

    /// Internal inconsistency (e.g. receipts exist but the day counter
    /// set is empty). Aborts the operation before any remote call.
    #[error("Internal inconsistency: {0}")]
    Internal(String),
}

impl From<RepoError> for FiscalError {
    fn from(err: RepoError) -> Self {
        FiscalError::Database(err.to_string())
    }
}

impl From<CertError> for FiscalError {
    fn from(err: CertError) -> Self {
        FiscalError::Signing(err.to_string())
    }
}

impl From<FdmsError> for FiscalError {
    fn from(err: FdmsError) -> Self {
        match err {
            FdmsError::Network(msg) => FiscalError::Network(msg),
            FdmsError::Rejected { status, message } => {
                FiscalError::Rejected(format!("{} ({})", message, status))
            }
            FdmsError::Protocol(msg) => FiscalError::Rejected(msg),
        }
    }
}

pub type FiscalResult<T> = Result<T, FiscalError>;
