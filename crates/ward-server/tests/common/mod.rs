#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt; // for oneshot
use ward_db::{create_pool, DbRuntimeSettings, PatientStore, SqliteStore, StoreError};
use ward_server::{app, AppState};
use ward_types::{NewPatient, Row, SchemaPolicy};

/// Delegates to a real SQLite store and counts every call.
pub struct RecordingStore {
    pub inner: SqliteStore,
    pub ensures: AtomicUsize,
    pub inserts: AtomicUsize,
    pub selects: AtomicUsize,
}

impl RecordingStore {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl PatientStore for RecordingStore {
    fn table_exists(&self) -> Result<bool, StoreError> {
        self.inner.table_exists()
    }

    fn ensure_table(&self) -> Result<bool, StoreError> {
        self.ensures.fetch_add(1, Ordering::SeqCst);
        self.inner.ensure_table()
    }

    fn insert_patients(&self, patients: &[NewPatient]) -> Result<usize, StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_patients(patients)
    }

    fn select(&self, sql: &str) -> Result<Vec<Row>, StoreError> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        self.inner.select(sql)
    }

    fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping()
    }
}

/// A store whose database is unreachable.
pub struct BrokenStore;

fn unreachable_db() -> StoreError {
    StoreError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
        Some("unable to open database file".to_string()),
    ))
}

impl PatientStore for BrokenStore {
    fn table_exists(&self) -> Result<bool, StoreError> {
        Err(unreachable_db())
    }

    fn ensure_table(&self) -> Result<bool, StoreError> {
        Err(unreachable_db())
    }

    fn insert_patients(&self, _patients: &[NewPatient]) -> Result<usize, StoreError> {
        Err(unreachable_db())
    }

    fn select(&self, _sql: &str) -> Result<Vec<Row>, StoreError> {
        Err(unreachable_db())
    }

    fn ping(&self) -> Result<(), StoreError> {
        Err(unreachable_db())
    }
}

/// Router over a fresh file-backed database.
pub struct TestApp {
    pub app: Router,
    pub store: Arc<RecordingStore>,
    _file: tempfile::NamedTempFile,
}

impl TestApp {
    pub fn new(policy: SchemaPolicy) -> Self {
        Self::with_state(policy, |_| {})
    }

    /// Builds the app after letting `configure` adjust the state.
    pub fn with_state(policy: SchemaPolicy, configure: impl FnOnce(&mut AppState)) -> Self {
        let file = tempfile::NamedTempFile::new().unwrap();
        let pool = create_pool(file.path().to_str().unwrap(), DbRuntimeSettings::default())
            .expect("failed to create pool");
        let store = Arc::new(RecordingStore {
            inner: SqliteStore::new(pool),
            ensures: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            selects: AtomicUsize::new(0),
        });

        let mut state = AppState::new(store.clone(), policy);
        configure(&mut state);

        Self {
            app: app(state),
            store,
            _file: file,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        send(&self.app, req).await
    }

    pub fn patient_count(&self) -> i64 {
        let conn = self.store.inner.pool().get().unwrap();
        conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))
            .unwrap()
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "body is not JSON ({e}): {}",
                String::from_utf8_lossy(&self.body)
            )
        })
    }
}

pub async fn send(app: &Router, req: Request<Body>) -> TestResponse {
    let resp = app.clone().oneshot(req).await.unwrap();
    let (parts, body) = resp.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    TestResponse {
        status: parts.status,
        headers: parts.headers,
        body: body.to_vec(),
    }
}

pub fn insert_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/insert")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

pub fn query_request(sql: &str) -> Request<Body> {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("sql", sql)
        .finish();
    request(Method::GET, &format!("/query?{query}"))
}

pub fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Asserts the headers every response must carry.
pub fn assert_gateway_headers(headers: &HeaderMap) {
    let expect = [
        (header::CONTENT_TYPE, "application/json"),
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
        (
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            "Content-Type, Authorization",
        ),
    ];
    for (name, value) in expect {
        assert_eq!(
            headers.get(&name).and_then(|v| v.to_str().ok()),
            Some(value),
            "header {name} missing or wrong"
        );
    }
}
