//! Fiscal device protocol engine
//!
//! Transforms back-office sales documents into canonically serialized,
//! hash-chained, signed fiscal receipts; submits them idempotently with
//! offline fallback and ordered replay; aggregates daily counters for
//! day close; and re-verifies the whole chain independently.

pub mod allocation;
pub mod audit;
pub mod canonical;
pub mod chain;
pub mod common;
pub mod config;
pub mod counters;
pub mod db;
pub mod fdms;
pub mod offline;
pub mod service;
pub mod submit;

pub use common::error::{FiscalError, FiscalResult};
pub use service::FiscalService;
