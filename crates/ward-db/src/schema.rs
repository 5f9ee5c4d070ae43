//! Bootstrap of the `patients` table.
//!
//! The table is the only schema artifact the gateway owns. It is created
//! lazily with `CREATE TABLE IF NOT EXISTS`, and [`SchemaGuard`] decides how
//! often that happens according to the configured [`SchemaPolicy`].

use crate::{PatientStore, StoreError};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use ward_types::SchemaPolicy;

/// Name of the single table managed by the gateway.
pub const PATIENTS_TABLE: &str = "patients";

// SQLite does not enforce declared column types, so the length and date
// rules are CHECK constraints. A bad date is a storage error, not a 400.
const CREATE_PATIENTS_SQL: &str = "
    CREATE TABLE IF NOT EXISTS patients (
        patientid INTEGER PRIMARY KEY AUTOINCREMENT,
        name VARCHAR(100) CHECK (name IS NULL OR length(name) <= 100),
        date_of_birth DATE CHECK (date_of_birth IS NULL OR date(date_of_birth) IS NOT NULL)
    );";

/// Returns whether the `patients` table exists.
///
/// # Errors
///
/// Returns the engine error if the catalogue cannot be read.
pub fn patients_table_exists(conn: &Connection) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [PATIENTS_TABLE],
        |row| row.get(0),
    )
}

/// Creates the `patients` table if it is missing.
///
/// Returns `true` when this call created the table and `false` when it was
/// already there. The common case is a single read of the catalogue. When
/// the table is absent the write lock is taken up front (`BEGIN IMMEDIATE`)
/// so that a concurrent creator makes this call wait on the busy timeout
/// instead of failing, and `IF NOT EXISTS` turns the loser's create into a
/// no-op.
///
/// # Errors
///
/// Returns the engine error if the lock cannot be taken or the DDL fails.
pub fn ensure_patients_table(conn: &Connection) -> rusqlite::Result<bool> {
    if patients_table_exists(conn)? {
        return Ok(false);
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let created = !patients_table_exists(&tx)?;
    tx.execute_batch(CREATE_PATIENTS_SQL)?;
    tx.commit()?;

    Ok(created)
}

/// Errors surfaced by [`SchemaGuard::check`].
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The existence probe or the create failed.
    #[error("database setup failed: {0}")]
    Setup(#[from] StoreError),

    /// The table is absent and the policy forbids creating it.
    #[error("patients table does not exist")]
    Missing,
}

/// Applies a [`SchemaPolicy`] before each request reaches the handlers.
#[derive(Debug)]
pub struct SchemaGuard {
    policy: SchemaPolicy,
    ready: AtomicBool,
}

impl SchemaGuard {
    /// Creates a guard for the given policy. Nothing is checked yet.
    pub fn new(policy: SchemaPolicy) -> Self {
        Self {
            policy,
            ready: AtomicBool::new(false),
        }
    }

    /// The policy this guard enforces.
    pub fn policy(&self) -> SchemaPolicy {
        self.policy
    }

    /// Ensures the table is usable under the configured policy.
    ///
    /// Under [`SchemaPolicy::Once`] a failed attempt leaves the guard
    /// unready, so the next request tries again.
    ///
    /// # Errors
    ///
    /// `SchemaError::Setup` if the store fails, `SchemaError::Missing` if
    /// the policy is `RequireExisting` and the table is absent.
    pub fn check(&self, store: &dyn PatientStore) -> Result<(), SchemaError> {
        match self.policy {
            SchemaPolicy::PerRequest => {
                store.ensure_table()?;
                Ok(())
            }
            SchemaPolicy::Once => {
                if self.ready.load(Ordering::Acquire) {
                    return Ok(());
                }
                store.ensure_table()?;
                self.ready.store(true, Ordering::Release);
                Ok(())
            }
            SchemaPolicy::RequireExisting => {
                if store.table_exists()? {
                    Ok(())
                } else {
                    Err(SchemaError::Missing)
                }
            }
        }
    }
}
