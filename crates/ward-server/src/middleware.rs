use axum::{
    body::Body,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use ward_db::SchemaError;

use crate::{api::ApiError, response, AppState};

/// Answers every `OPTIONS` request with an empty 200.
///
/// Runs outside the schema guard, so a preflight never touches storage.
/// The CORS headers are stamped by the outer header layers.
pub async fn preflight_middleware(req: Request<Body>, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return response::preflight();
    }
    next.run(req).await
}

/// Guarantees the patients table before any handler runs.
///
/// Applies the configured schema policy on a blocking thread. A setup
/// failure ends the request with 500 and the handler is never called.
pub async fn schema_middleware(req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    // 1. Get AppState
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or_else(|| ApiError::Internal("application state missing".to_string()))?
        .clone();

    // 2. Check schema (blocking DB operation)
    let guard_state = state.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        guard_state.schema.check(guard_state.store.as_ref())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("task join error: {}", e)))?;

    match outcome {
        Ok(()) => Ok(next.run(req).await),
        Err(SchemaError::Missing) => {
            tracing::warn!(
                policy = state.schema.policy().as_str(),
                "patients table does not exist, refusing request"
            );
            Err(ApiError::SchemaMissing(state.messages.table_missing.clone()))
        }
        Err(SchemaError::Setup(e)) => {
            tracing::error!(error = %e, "patients table bootstrap failed");
            Err(ApiError::SchemaSetup)
        }
    }
}
