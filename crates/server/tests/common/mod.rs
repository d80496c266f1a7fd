//! Common test utilities for in-process API tests with mocks.
//!
//! The fixture builds the real router over temp input/output directories,
//! with mock tracker lookups and an optional mock torrent client.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crosstag_core::{
    config::{PathsConfig, ServerConfig, TrackerApiConfig},
    testing::{MockTorrentClient, MockTrackerLookup},
    Config, Injector, TorrentMetadata, Tracker, TrackerLookups,
};

/// Re-export fixtures for test convenience
pub use crosstag_core::testing::fixtures;

/// Test fixture for webhook testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_webhook() {
///     let fixture = TestFixture::new().await;
///     let hash = fixture.add_input("a.torrent", &meta).await;
///
///     let response = fixture.post("/api/v1/webhook", json!({ "infohash": hash })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    pub router: Router,
    pub red: Arc<MockTrackerLookup>,
    pub ops: Arc<MockTrackerLookup>,
    /// Present when the fixture was built with injection enabled
    pub torrent_client: Option<Arc<MockTorrentClient>>,
    pub input_dir: TempDir,
    pub output_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::build(false).await
    }

    /// Fixture whose webhook also injects into a mock torrent client.
    pub async fn with_injection() -> Self {
        Self::build(true).await
    }

    async fn build(with_injection: bool) -> Self {
        let input_dir = TempDir::new().expect("Failed to create input dir");
        let output_dir = TempDir::new().expect("Failed to create output dir");

        let red = Arc::new(MockTrackerLookup::new(Tracker::Red));
        let ops = Arc::new(MockTrackerLookup::new(Tracker::Ops));
        let lookups = TrackerLookups::new(red.clone(), ops.clone());

        let torrent_client = with_injection.then(|| Arc::new(MockTorrentClient::new()));
        let injector = torrent_client
            .as_ref()
            .map(|client| Injector::new(client.clone(), "crosstag"));

        let config = Config {
            red: TrackerApiConfig::new("red-secret"),
            ops: TrackerApiConfig::new("ops-secret"),
            paths: PathsConfig {
                input_directory: Some(input_dir.path().to_path_buf()),
                output_directory: output_dir.path().to_path_buf(),
            },
            injection: None,
            server: ServerConfig::default(),
        };

        let state = Arc::new(crosstag_server::state::AppState::new(
            config,
            lookups,
            injector,
            input_dir.path().to_path_buf(),
        ));
        let router = crosstag_server::api::create_router(state);

        Self {
            router,
            red,
            ops,
            torrent_client,
            input_dir,
            output_dir,
        }
    }

    /// Writes a torrent into the input directory and returns its infohash
    /// as the client would send it.
    pub async fn add_input(&self, file_name: &str, meta: &TorrentMetadata) -> String {
        fixtures::write_torrent(self.input_dir.path(), file_name, meta).await;
        meta.info_hash().unwrap().to_lowercase_hex()
    }

    pub fn output_path(&self, tracker: Tracker, file_name: &str) -> PathBuf {
        self.output_dir
            .path()
            .join(tracker.short_name())
            .join(file_name)
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
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
