//! Shared types for the Ward patient-records gateway.
//!
//! This crate holds the wire shapes exchanged with HTTP clients, the
//! schema-bootstrap policy selected in configuration, and the catalogue of
//! user-facing message texts. Both `ward-db` and `ward-server` depend on it;
//! it depends on nothing but `serde` and `serde_json`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single result row returned by a read query.
///
/// Keys are column names in the order the statement produced them.
pub type Row = serde_json::Map<String, Value>;

/// One patient in an insert batch.
///
/// Fields are kept as the client sent them and are not validated here.
/// A missing field, or an entry that is not an object at all, becomes
/// `null`. Converting values to column parameters is up to storage, which
/// also rejects malformed dates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct NewPatient {
    /// Display name of the patient.
    pub name: Value,
    /// Date of birth, normally a `YYYY-MM-DD` string.
    pub date_of_birth: Value,
}

impl NewPatient {
    /// A patient with both fields given.
    pub fn new(name: impl Into<Value>, date_of_birth: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            date_of_birth: date_of_birth.into(),
        }
    }
}

impl From<Value> for NewPatient {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(mut fields) => Self {
                name: fields.get_mut("name").map(Value::take).unwrap_or_default(),
                date_of_birth: fields
                    .get_mut("date_of_birth")
                    .map(Value::take)
                    .unwrap_or_default(),
            },
            _ => Self::default(),
        }
    }
}

/// Request body for `POST /insert`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertRequest {
    /// Patients to insert, in order.
    pub patients: Vec<NewPatient>,
}

/// How the patients table is guaranteed before a request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaPolicy {
    /// Run the idempotent create on every request.
    #[default]
    PerRequest,
    /// Create once, then trust the cached readiness flag.
    Once,
    /// Never create; requests fail with 404 while the table is absent.
    RequireExisting,
}

impl SchemaPolicy {
    /// Returns the configuration spelling of this policy.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerRequest => "per_request",
            Self::Once => "once",
            Self::RequireExisting => "require_existing",
        }
    }
}

impl std::str::FromStr for SchemaPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_request" => Ok(Self::PerRequest),
            "once" => Ok(Self::Once),
            "require_existing" => Ok(Self::RequireExisting),
            other => Err(format!("unknown schema policy: {other}")),
        }
    }
}

/// Fixed envelope text for a failed schema bootstrap.
pub const DATABASE_SETUP_FAILED: &str = "Database setup failed";

/// Fixed envelope text for an unparseable insert body.
pub const INVALID_JSON_FORMAT: &str = "Invalid JSON format";

/// Localized message texts returned in response envelopes.
///
/// Every field can be overridden from the `[messages]` configuration table;
/// fields left out keep their English default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    /// Returned after a successful insert.
    pub insert_success: String,
    /// Returned when a query is missing or is not a `SELECT`.
    pub select_only: String,
    /// Returned for unknown routes.
    pub invalid_request: String,
    /// Returned when the table is absent under [`SchemaPolicy::RequireExisting`].
    pub table_missing: String,
}

impl Messages {
    /// The built-in English catalogue.
    pub fn english() -> Self {
        Self {
            insert_success: "Patients inserted successfully".to_string(),
            select_only: "Only SELECT queries are allowed".to_string(),
            invalid_request: "Invalid request".to_string(),
            table_missing: "Patients table does not exist".to_string(),
        }
    }
}

impl Default for Messages {
    fn default() -> Self {
        Self::english()
    }
}
