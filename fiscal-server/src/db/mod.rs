//! Database Module
//!
//! Embedded SurrealDB connection and per-table repositories.

pub mod models;
pub mod repository;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, RocksDb};

/// Open the on-disk database.
pub async fn connect_rocksdb(path: &str) -> surrealdb::Result<Surreal<Db>> {
    let db = Surreal::new::<RocksDb>(path).await?;
    db.use_ns("fiscal").use_db("fiscal").await?;
    tracing::info!(path = %path, "Database connection established");
    Ok(db)
}

/// In-memory database, used by tests.
pub async fn connect_memory() -> surrealdb::Result<Surreal<Db>> {
    let db = Surreal::new::<Mem>(()).await?;
    db.use_ns("fiscal").use_db("fiscal").await?;
    Ok(db)
}
