//! Ward server library logic.
//!
//! The router mediates between HTTP and the `patients` table: it guarantees
//! the schema, validates requests, and wraps every outcome in the
//! `{success, message|data}` envelope.

pub mod api;
pub mod config;
pub mod middleware;
pub mod response;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, StatusCode},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use ward_db::{PatientStore, SchemaGuard};
use ward_types::{Messages, SchemaPolicy};

/// Maximum request body size (2 MiB) unless configured otherwise.
pub const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Transport limits applied by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
    /// Per-request deadline. `None` lets requests run to completion.
    pub request_timeout: Option<Duration>,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_body_bytes: MAX_REQUEST_BODY_BYTES,
            request_timeout: None,
        }
    }
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Storage capability for the patients table.
    pub store: Arc<dyn PatientStore>,
    /// Schema bootstrap policy and its readiness cache.
    pub schema: Arc<SchemaGuard>,
    /// Localized envelope texts.
    pub messages: Arc<Messages>,
    /// Body size and timeout limits.
    pub limits: RequestLimits,
}

impl AppState {
    /// State with English messages and default limits.
    pub fn new(store: Arc<dyn PatientStore>, policy: SchemaPolicy) -> Self {
        Self {
            store,
            schema: Arc::new(SchemaGuard::new(policy)),
            messages: Arc::new(Messages::english()),
            limits: RequestLimits::default(),
        }
    }
}

/// Builds the application router.
///
/// `OPTIONS` on any path is answered before the schema check. Everything
/// else passes the schema guard first, then reaches `/insert`, `/query`, or
/// the 404 fallback. Every response, including rejections produced by the
/// layers themselves, leaves with the JSON content type and the CORS headers.
pub fn app(state: AppState) -> Router {
    let limits = state.limits;

    let router = Router::new()
        .route(
            "/insert",
            post(api::insert_handler).fallback(api::not_found_handler),
        )
        // Without an explicit HEAD endpoint axum would answer HEAD with the
        // GET handler.
        .route(
            "/query",
            get(api::query_handler)
                .head(api::not_found_handler)
                .fallback(api::not_found_handler),
        )
        .fallback(api::not_found_handler)
        .layer(axum::middleware::from_fn(middleware::schema_middleware))
        .layer(DefaultBodyLimit::max(limits.max_body_bytes));

    let router = match limits.request_timeout {
        Some(timeout) => router.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        )),
        None => router,
    };

    router
        .layer(axum::middleware::from_fn(middleware::preflight_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization"),
        ))
        .layer(Extension(Arc::new(state)))
}

/// Installs the global tracing subscriber.
///
/// An unparseable filter falls back to `info` rather than aborting startup.
pub fn init_tracing(logging: &config::LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
