//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process
//! with mock capabilities and SQLite stores in a temp directory, so the API
//! can be exercised without any external service.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use curator_core::{
    testing::MockCapabilities, BatchConfig, Config, DatabaseConfig, HistoryStore, ItemStore,
    PipelineRunner, RunHistoryRecorder, SqliteHistoryStore, SqliteItemStore,
};
use curator_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use curator_core::testing::fixtures;

/// Test fixture with controllable capability mocks.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_batch() {
///     let fixture = TestFixture::new();
///     fixture.add_tool("acme", "Acme");
///
///     let response = fixture.post("/api/v1/batches", json!({})).await;
///     assert_eq!(response.status, StatusCode::ACCEPTED);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock capabilities - configure stage outcomes
    pub mocks: MockCapabilities,
    pub item_store: Arc<SqliteItemStore>,
    pub history_store: Arc<SqliteHistoryStore>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_batch_config(BatchConfig::default())
    }

    pub fn with_batch_config(batch: BatchConfig) -> Self {
        Self::with_config(|config| config.batch = batch)
    }

    /// Fixture whose config is adjusted by `edit` before the router is built.
    pub fn with_config(edit: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let mut config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            ..Default::default()
        };
        edit(&mut config);

        let item_store =
            Arc::new(SqliteItemStore::new(&db_path).expect("Failed to create item store"));
        let history_store =
            Arc::new(SqliteHistoryStore::new(&db_path).expect("Failed to create history store"));

        // Capabilities come from mocks, persistence from the real SQLite store.
        let mocks = MockCapabilities::new();
        let mut capabilities = mocks.build();
        capabilities.persister = item_store.clone();
        capabilities.names = item_store.clone();

        let runner = PipelineRunner::new(capabilities)
            .with_history(RunHistoryRecorder::new(
                Arc::clone(&history_store) as Arc<dyn HistoryStore>
            ))
            .with_retry(fixtures::fast_retry());

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&item_store) as Arc<dyn ItemStore>,
            Arc::clone(&history_store) as Arc<dyn HistoryStore>,
            Arc::new(runner),
        ));

        Self {
            router: create_router(state),
            mocks,
            item_store,
            history_store,
            temp_dir,
        }
    }

    /// Register a tool in the item store.
    pub fn add_tool(&self, id: &str, name: &str) {
        self.item_store
            .upsert(&fixtures::tool_entry(id, name))
            .expect("Failed to add tool");
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a GET request and return the raw body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Poll a batch until it reports finished.
    pub async fn wait_for_batch(&self, batch_id: &str) -> Value {
        for _ in 0..200 {
            let response = self.get(&format!("/api/v1/batches/{}", batch_id)).await;
            if response.body["progress"]["finished"] == true && !response.body["summary"].is_null()
            {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Batch {} did not finish in time", batch_id);
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
