//! Storage layer for the Ward gateway.
//!
//! Provides the SQLite connection pool (via `r2d2`), the idempotent
//! bootstrap of the `patients` table, and the [`PatientStore`] capability
//! the HTTP handlers are written against.
//!
//! # Design decisions
//!
//! - **One table, no migrations**: the only schema artifact is `patients`,
//!   created with `CREATE TABLE IF NOT EXISTS` whenever the configured
//!   [`SchemaPolicy`](ward_types::SchemaPolicy) asks for it.
//! - **`r2d2` connection pool**: connections are RAII guards, so every exit
//!   path of a handler (success, storage error, early return) hands the
//!   connection back to the pool.
//! - **Injected capability**: handlers receive an `Arc<dyn PatientStore>`
//!   instead of reaching for a global pool, so tests can swap in doubles.

mod error;
mod pool;
mod schema;
mod store;

pub use error::StoreError;
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
pub use schema::{
    ensure_patients_table, patients_table_exists, SchemaError, SchemaGuard, PATIENTS_TABLE,
};
pub use store::{insert_patients, select_rows, PatientStore, SqliteStore, MAX_ROWS_PER_STATEMENT};
