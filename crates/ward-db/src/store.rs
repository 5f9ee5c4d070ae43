//! The storage capability the HTTP handlers are written against.
//!
//! [`PatientStore`] is the seam between request mediation and the engine.
//! [`SqliteStore`] is the production implementation over a [`DbPool`]; the
//! free functions [`insert_patients`] and [`select_rows`] do the actual SQL
//! on a borrowed connection so they can be tested without a pool.

use crate::schema::{ensure_patients_table, patients_table_exists};
use crate::{DbPool, StoreError};
use base64::Engine as _;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Batch, Connection, Transaction, TransactionBehavior};
use serde_json::{Number, Value};
use ward_types::{NewPatient, Row};

/// Rows per `INSERT` statement. Two bind parameters per row keeps each
/// statement under SQLite's historical limit of 999 variables.
pub const MAX_ROWS_PER_STATEMENT: usize = 400;

/// Storage operations needed by the gateway.
///
/// All methods are blocking; async callers run them on
/// `tokio::task::spawn_blocking`.
pub trait PatientStore: Send + Sync {
    /// Returns whether the `patients` table exists.
    fn table_exists(&self) -> Result<bool, StoreError>;

    /// Creates the `patients` table if missing. Returns `true` if it was created.
    fn ensure_table(&self) -> Result<bool, StoreError>;

    /// Inserts the batch atomically and returns the number of rows written.
    fn insert_patients(&self, patients: &[NewPatient]) -> Result<usize, StoreError>;

    /// Runs a read-only statement and returns its rows.
    fn select(&self, sql: &str) -> Result<Vec<Row>, StoreError>;

    /// Round-trips a trivial statement to prove the database is reachable.
    fn ping(&self) -> Result<(), StoreError>;
}

/// [`PatientStore`] backed by an `r2d2` SQLite pool.
///
/// Each call checks out one connection for its own duration. The pooled
/// guard is dropped on every return path, success or error.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Wraps an existing pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl PatientStore for SqliteStore {
    fn table_exists(&self) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        Ok(patients_table_exists(&conn)?)
    }

    fn ensure_table(&self) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let created = ensure_patients_table(&conn)?;
        if created {
            tracing::info!("created patients table");
        }
        Ok(created)
    }

    fn insert_patients(&self, patients: &[NewPatient]) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;
        Ok(insert_patients(&conn, patients)?)
    }

    fn select(&self, sql: &str) -> Result<Vec<Row>, StoreError> {
        let conn = self.pool.get()?;
        select_rows(&conn, sql)
    }

    fn ping(&self) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

/// Inserts `patients` in input order as one all-or-nothing unit.
///
/// The batch is written as multi-row `INSERT ... VALUES (?, ?), ...`
/// statements of at most [`MAX_ROWS_PER_STATEMENT`] rows inside a single
/// immediate transaction. If any statement fails the transaction is rolled
/// back on drop and no row of the batch remains. An empty batch issues no
/// statement and returns `Ok(0)`.
///
/// # Errors
///
/// Returns the engine error of the first failing statement, or a conversion
/// error if a field holds an array or object.
pub fn insert_patients(conn: &Connection, patients: &[NewPatient]) -> rusqlite::Result<usize> {
    if patients.is_empty() {
        return Ok(0);
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let mut inserted = 0;
    for chunk in patients.chunks(MAX_ROWS_PER_STATEMENT) {
        let sql = insert_statement(chunk.len());
        let mut values = Vec::with_capacity(chunk.len() * 2);
        for patient in chunk {
            values.push(column_value("name", &patient.name)?);
            values.push(column_value("date_of_birth", &patient.date_of_birth)?);
        }
        inserted += tx.execute(&sql, params_from_iter(values))?;
    }
    tx.commit()?;

    Ok(inserted)
}

/// Binds a client-supplied field as a text parameter. Numbers keep their
/// JSON spelling and booleans become `1` or `0`.
fn column_value(column: &str, value: &Value) -> rusqlite::Result<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Number(n) => Ok(SqlValue::Text(n.to_string())),
        Value::Bool(b) => Ok(SqlValue::Text(if *b { "1" } else { "0" }.to_string())),
        Value::Array(_) | Value::Object(_) => Err(rusqlite::Error::ToSqlConversionFailure(
            format!("{column} must be a scalar value").into(),
        )),
    }
}

fn insert_statement(rows: usize) -> String {
    format!(
        "INSERT INTO patients (name, date_of_birth) VALUES {}",
        vec!["(?, ?)"; rows].join(", ")
    )
}

/// Runs `sql` verbatim and collects every row as a JSON object.
///
/// The text must hold exactly one statement, and the engine must report it
/// as read-only. Otherwise nothing is stepped and
/// [`StoreError::NotReadOnly`] or [`StoreError::MultipleStatements`] is
/// returned. Blank text yields no rows.
///
/// # Errors
///
/// Returns `StoreError::Database` if a statement fails to compile or step.
pub fn select_rows(conn: &Connection, sql: &str) -> Result<Vec<Row>, StoreError> {
    let mut batch = Batch::new(conn, sql);
    let Some(mut stmt) = batch.next()? else {
        return Ok(Vec::new());
    };
    if !stmt.readonly() {
        return Err(StoreError::NotReadOnly);
    }
    // Compiling the trailing statement does not run it.
    if batch.next()?.is_some() {
        return Err(StoreError::MultipleStatements);
    }

    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = Row::with_capacity(columns.len());
        for (idx, name) in columns.iter().enumerate() {
            object.insert(name.clone(), json_value(row.get_ref(idx)?));
        }
        out.push(object);
    }

    Ok(out)
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
    }
}
