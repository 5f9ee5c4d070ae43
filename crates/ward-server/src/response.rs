//! The uniform response envelope.
//!
//! Every body is a JSON object with a boolean `success`. The insert path and
//! all errors carry a `message`; the query path carries `data`, which holds
//! either the rows or, on a storage failure, the engine's error text.

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// `{success, message}` body.
#[derive(Debug, Serialize)]
pub struct MessageEnvelope {
    pub success: bool,
    pub message: String,
}

/// `{success, data}` body.
#[derive(Debug, Serialize)]
pub struct DataEnvelope<T> {
    pub success: bool,
    pub data: T,
}

/// Renders a `{success, message}` envelope with the given status.
pub fn message(status: StatusCode, success: bool, message: impl Into<String>) -> Response {
    let body = MessageEnvelope {
        success,
        message: message.into(),
    };
    (status, Json(body)).into_response()
}

/// Renders a `{success, data}` envelope.
///
/// Always 200: storage failures on the query path are reported through
/// `success: false`, not through the status code.
pub fn data<T: Serialize>(success: bool, data: T) -> Response {
    (StatusCode::OK, Json(DataEnvelope { success, data })).into_response()
}

/// Empty 200 answer to an `OPTIONS` request.
pub fn preflight() -> Response {
    Response::new(Body::empty())
}
