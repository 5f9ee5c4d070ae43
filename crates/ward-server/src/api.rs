//! API handlers for the Ward server.

use crate::{response, AppState};
use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, QueryRejection},
        Extension, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use ward_db::StoreError;
use ward_types::{InsertRequest, DATABASE_SETUP_FAILED, INVALID_JSON_FORMAT};

/// Query-string parameters for `GET /query`.
#[derive(Debug, Deserialize)]
pub struct QueryParams {
    /// The statement to run. Must start with `SELECT`.
    pub sql: Option<String>,
}

/// API error type mapping to HTTP status codes.
///
/// Each variant carries the text placed in the envelope's `message`.
/// Storage failures during an insert or query are not errors at this
/// level: they are 200 responses with `success: false`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The patients table could not be guaranteed.
    #[error("schema setup failed")]
    SchemaSetup,
    /// The table is absent and the schema policy forbids creating it.
    #[error("schema missing: {0}")]
    SchemaMissing(String),
    /// The insert body is not a valid batch.
    #[error("invalid input: {0}")]
    InvalidJson(String),
    /// The body could not be read, for example because it exceeds the limit.
    #[error("body rejected ({status}): {message}")]
    BodyRejected { status: StatusCode, message: String },
    /// The query is missing or is not a `SELECT`.
    #[error("validation rejected: {0}")]
    SelectOnly(String),
    /// No route matches the method and path.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::SchemaSetup => (
                StatusCode::INTERNAL_SERVER_ERROR,
                DATABASE_SETUP_FAILED.to_string(),
            ),
            ApiError::SchemaMissing(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InvalidJson(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BodyRejected { status, message } => (status, message),
            ApiError::SelectOnly(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        response::message(status, false, message)
    }
}

/// Returns whether `sql` is accepted by the read-only allow-list.
///
/// This is a prefix check on the trimmed, uppercased text. The text that is
/// executed keeps its original casing.
pub fn is_select(sql: &str) -> bool {
    sql.trim().to_uppercase().starts_with("SELECT")
}

/// Handler for `POST /insert`.
///
/// The body is parsed here rather than through the `Json` extractor so that
/// every malformed payload, whatever its content type, gets the same 400
/// envelope. A storage failure is a 200 with the engine text as `message`.
pub async fn insert_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body = body.map_err(|rejection| ApiError::BodyRejected {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;

    let request: InsertRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "rejecting malformed insert body");
        ApiError::InvalidJson(INVALID_JSON_FORMAT.to_string())
    })?;

    let batch_size = request.patients.len();
    let store = state.store.clone();
    let result = tokio::task::spawn_blocking(move || store.insert_patients(&request.patients))
        .await
        .map_err(|e| ApiError::Internal(format!("task join error: {}", e)))?;

    match result {
        Ok(inserted) => {
            tracing::info!(rows = inserted, "inserted patient batch");
            Ok(response::message(
                StatusCode::OK,
                true,
                state.messages.insert_success.as_str(),
            ))
        }
        Err(e) => {
            tracing::warn!(rows = batch_size, error = %e, "patient batch insert failed");
            Ok(response::message(StatusCode::OK, false, e.to_string()))
        }
    }
}

/// Handler for `GET /query`.
///
/// A missing, unparseable, or non-`SELECT` `sql` parameter is a 403 before
/// any storage call. A storage failure is a 200 with the engine text under
/// `data`.
pub async fn query_handler(
    Extension(state): Extension<Arc<AppState>>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let select_only = || ApiError::SelectOnly(state.messages.select_only.clone());

    let sql = params
        .ok()
        .and_then(|Query(params)| params.sql)
        .filter(|sql| is_select(sql))
        .ok_or_else(select_only)?;

    let store = state.store.clone();
    let result = tokio::task::spawn_blocking(move || store.select(&sql))
        .await
        .map_err(|e| ApiError::Internal(format!("task join error: {}", e)))?;

    match result {
        Ok(rows) => {
            tracing::debug!(rows = rows.len(), "query succeeded");
            Ok(response::data(true, rows))
        }
        Err(StoreError::NotReadOnly) => {
            tracing::warn!("rejected SELECT-prefixed statement that writes");
            Err(select_only())
        }
        Err(e) => {
            tracing::warn!(error = %e, "query failed");
            Ok(response::data(false, e.to_string()))
        }
    }
}

/// Fallback for every method and path without a handler.
pub async fn not_found_handler(Extension(state): Extension<Arc<AppState>>) -> ApiError {
    ApiError::NotFound(state.messages.invalid_request.clone())
}
