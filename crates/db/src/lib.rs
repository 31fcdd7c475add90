//! Document storage for Natours.
//!
//! - [`collection`] -- the storage capability traits every backend implements.
//! - [`postgres`] -- JSONB documents in PostgreSQL via sqlx.
//! - [`memory`] -- an in-process store used by tests and local development.
//! - [`models`] -- entity schemas, validation and model-level hooks.
//! - [`populate`] -- joins between collections on read.

pub mod collection;
pub mod error;
pub mod memory;
pub mod models;
pub mod populate;
pub mod postgres;

use sqlx::postgres::PgPoolOptions;

pub use collection::{Collection, DocumentStore, Normalizer};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations in `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
