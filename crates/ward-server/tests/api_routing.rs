mod common;

use axum::http::{header, Method, StatusCode};
use common::{
    assert_gateway_headers, insert_request, query_request, request, send, BrokenStore,
    RecordingStore, TestApp,
};
use serde_json::json;
use std::sync::Arc;
use ward_server::{app, AppState};
use ward_types::{Messages, SchemaPolicy};

#[tokio::test]
async fn options_is_an_empty_200_on_any_path() {
    let t = TestApp::new(SchemaPolicy::PerRequest);

    for uri in ["/insert", "/query", "/anything/at/all"] {
        let req = axum::http::Request::builder()
            .method(Method::OPTIONS)
            .uri(uri)
            .header(header::ORIGIN, "https://clinic.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(axum::body::Body::empty())
            .unwrap();
        let resp = t.send(req).await;
        assert_eq!(resp.status, StatusCode::OK, "uri {uri}");
        assert!(resp.body.is_empty());
        assert_gateway_headers(&resp.headers);
    }

    assert_eq!(RecordingStore::count(&t.store.ensures), 0);
}

#[tokio::test]
async fn options_skips_a_broken_database() {
    let app = app(AppState::new(Arc::new(BrokenStore), SchemaPolicy::PerRequest));

    let resp = send(&app, request(Method::OPTIONS, "/query")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.is_empty());
}

#[tokio::test]
async fn unknown_route_is_404_envelope() {
    let t = TestApp::new(SchemaPolicy::PerRequest);

    let resp = t.send(request(Method::GET, "/unknown")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_gateway_headers(&resp.headers);
    assert_eq!(
        resp.json(),
        json!({"success": false, "message": Messages::english().invalid_request})
    );
}

#[tokio::test]
async fn wrong_method_on_known_path_is_404() {
    let t = TestApp::new(SchemaPolicy::PerRequest);

    let cases = [
        (Method::GET, "/insert"),
        (Method::POST, "/query"),
        (Method::DELETE, "/query"),
        (Method::PUT, "/insert"),
    ];
    for (method, uri) in cases {
        let resp = t.send(request(method.clone(), uri)).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND, "{method} {uri}");
        assert_eq!(resp.json()["success"], false);
    }
}

#[tokio::test]
async fn head_on_query_is_404_and_runs_nothing() {
    let t = TestApp::new(SchemaPolicy::PerRequest);

    let resp = t.send(request(Method::HEAD, "/query?sql=SELECT%201")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_gateway_headers(&resp.headers);
    assert_eq!(RecordingStore::count(&t.store.selects), 0);

    let resp = t.send(request(Method::HEAD, "/insert")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(RecordingStore::count(&t.store.inserts), 0);
}

#[tokio::test]
async fn schema_failure_is_500_before_any_handler() {
    let app = app(AppState::new(Arc::new(BrokenStore), SchemaPolicy::PerRequest));

    let requests = [
        insert_request(r#"{"patients": [{"name": "Alice", "date_of_birth": "1990-01-01"}]}"#),
        insert_request("not json"),
        query_request("SELECT * FROM patients"),
        query_request("DROP TABLE patients"),
        request(Method::GET, "/unknown"),
    ];
    for req in requests {
        let resp = send(&app, req).await;
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_gateway_headers(&resp.headers);
        assert_eq!(
            resp.json(),
            json!({"success": false, "message": "Database setup failed"})
        );
    }
}

#[tokio::test]
async fn per_request_policy_ensures_on_every_request() {
    let t = TestApp::new(SchemaPolicy::PerRequest);

    t.send(query_request("SELECT 1")).await;
    t.send(query_request("SELECT 2")).await;
    t.send(request(Method::GET, "/unknown")).await;

    assert_eq!(RecordingStore::count(&t.store.ensures), 3);
}

#[tokio::test]
async fn once_policy_ensures_a_single_time() {
    let t = TestApp::new(SchemaPolicy::Once);

    for _ in 0..3 {
        let resp = t.send(query_request("SELECT * FROM patients")).await;
        assert_eq!(resp.json()["success"], true);
    }

    assert_eq!(RecordingStore::count(&t.store.ensures), 1);
}

#[tokio::test]
async fn require_existing_policy_is_404_until_table_exists() {
    let t = TestApp::new(SchemaPolicy::RequireExisting);

    let resp = t.send(query_request("SELECT * FROM patients")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_gateway_headers(&resp.headers);
    assert_eq!(
        resp.json(),
        json!({"success": false, "message": Messages::english().table_missing})
    );
    assert_eq!(RecordingStore::count(&t.store.ensures), 0);
    assert_eq!(RecordingStore::count(&t.store.selects), 0);

    // Someone else creates the table; the gateway starts serving.
    {
        let conn = t.store.inner.pool().get().unwrap();
        ward_db::ensure_patients_table(&conn).unwrap();
    }

    let resp = t.send(query_request("SELECT * FROM patients")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json(), json!({"success": true, "data": []}));
}

#[tokio::test]
async fn concurrent_requests_share_the_pool() {
    let t = Arc::new(TestApp::new(SchemaPolicy::PerRequest));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let t = Arc::clone(&t);
            tokio::spawn(async move {
                let body = json!({
                    "patients": [{"name": format!("patient-{i}"), "date_of_birth": "2000-01-01"}]
                });
                t.send(insert_request(body.to_string())).await
            })
        })
        .collect();

    for handle in handles {
        let resp = handle.await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.json()["success"], true);
    }

    assert_eq!(t.patient_count(), 16);
}

/// Answers everything, but selects take far longer than the request deadline.
struct SlowStore;

impl ward_db::PatientStore for SlowStore {
    fn table_exists(&self) -> Result<bool, ward_db::StoreError> {
        Ok(true)
    }

    fn ensure_table(&self) -> Result<bool, ward_db::StoreError> {
        Ok(false)
    }

    fn insert_patients(
        &self,
        patients: &[ward_types::NewPatient],
    ) -> Result<usize, ward_db::StoreError> {
        Ok(patients.len())
    }

    fn select(&self, _sql: &str) -> Result<Vec<ward_types::Row>, ward_db::StoreError> {
        std::thread::sleep(std::time::Duration::from_millis(500));
        Ok(Vec::new())
    }

    fn ping(&self) -> Result<(), ward_db::StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn request_timeout_is_enforced_when_configured() {
    let mut state = AppState::new(Arc::new(SlowStore), SchemaPolicy::PerRequest);
    state.limits.request_timeout = Some(std::time::Duration::from_millis(50));
    let app = app(state);

    let resp = send(&app, query_request("SELECT 1")).await;
    assert_eq!(resp.status, StatusCode::REQUEST_TIMEOUT);
    assert_gateway_headers(&resp.headers);

    let resp = send(&app, insert_request(r#"{"patients": []}"#)).await;
    assert_eq!(resp.status, StatusCode::OK);
}
