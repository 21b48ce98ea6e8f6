//! Receipt chain state
//!
//! Per (device, fiscal day): the per-day counter and the digest of the
//! last receipt, which the next receipt embeds in its canonical string.

use crate::common::error::{FiscalError, FiscalResult};
use crate::db::models::Receipt;

/// Chain tail of one (device, fiscal day).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainState {
    NoReceipts,
    HasReceipts {
        last_hash: String,
        last_counter: i32,
    },
}

impl ChainState {
    /// Derive the chain tail from the persisted last receipt of the day.
    pub fn from_last(last: Option<&Receipt>) -> Self {
        match last {
            None => ChainState::NoReceipts,
            Some(r) => ChainState::HasReceipts {
                last_hash: r.digest.clone(),
                last_counter: r.receipt_counter,
            },
        }
    }

    /// Counter for the next receipt: 1 on an empty day.
    pub fn next_counter(&self) -> i32 {
        match self {
            ChainState::NoReceipts => 1,
            ChainState::HasReceipts { last_counter, .. } => last_counter + 1,
        }
    }

    /// Digest the next receipt must embed; absent on an empty day.
    pub fn previous_hash(&self) -> Option<&str> {
        match self {
            ChainState::NoReceipts => None,
            ChainState::HasReceipts { last_hash, .. } => Some(last_hash),
        }
    }
}

/// Cross-check the device's confirmed sequence position against the
/// remote service before every submission. A mismatch is fatal to the
/// current submission; the number is never re-derived by guessing.
pub fn check_alignment(local_last: Option<i64>, remote_last: i64) -> FiscalResult<()> {
    let local = local_last.unwrap_or(0);
    if local != remote_last {
        return Err(FiscalError::ChainOutOfSync {
            local,
            remote: remote_last,
        });
    }
    Ok(())
}
