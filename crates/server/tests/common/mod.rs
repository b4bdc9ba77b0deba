//! Common test utilities for in-process API testing.
//!
//! This module provides a test fixture that builds the full router with a
//! scripted fetch tool injected, so the HTTP surface can be exercised
//! without yt-dlp installed.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use marquee_core::{
    testing::{FixedSpace, RecordingHook, ScriptedTool},
    AuthConfig, AuthMethod, Config, FetcherConfig, MediaConfig, MediaFetcher, NoneAuthenticator,
    ProgressEvent, ServerConfig,
};
use marquee_server::state::AppState;

/// Test fixture wiring the router to scripted collaborators.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_fetch() {
///     let fixture = TestFixture::new(ScriptedTool::writing_artifact("mp4", 64));
///
///     let response = fixture.fetch(json!({ "url": "https://youtu.be/abc" })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Scripted fetch tool - inspect spawn counts and plans
    pub tool: Arc<ScriptedTool>,
    /// Playlist hook double - inspect notifications
    pub hook: Arc<RecordingHook>,
    /// Destination directory for fetched media
    pub media_dir: TempDir,
}

/// Response from a JSON test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Response from the streaming fetch endpoint
#[derive(Debug)]
pub struct StreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Raw body, one JSON document per line
    pub raw: String,
}

impl StreamResponse {
    /// Parses every NDJSON line into an event.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.raw
            .lines()
            .map(|line| serde_json::from_str(line).expect("Invalid NDJSON line"))
            .collect()
    }
}

impl TestFixture {
    pub fn new(tool: ScriptedTool) -> Self {
        Self::with_fetcher_config(tool, FetcherConfig::default())
    }

    pub fn with_fetcher_config(tool: ScriptedTool, fetcher_config: FetcherConfig) -> Self {
        let media_dir = TempDir::new().expect("Failed to create media dir");
        let tool = Arc::new(tool);
        let hook = Arc::new(RecordingHook::new());

        let config = Config {
            auth: AuthConfig {
                method: AuthMethod::None,
                api_key: None,
            },
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            media: MediaConfig {
                directory: media_dir.path().to_path_buf(),
            },
            fetcher: fetcher_config.clone(),
            playlist_hook: None,
        };

        let fetcher = Arc::new(MediaFetcher::new(
            fetcher_config,
            media_dir.path(),
            tool.clone(),
            Arc::new(FixedSpace(u64::MAX)),
            hook.clone(),
        ));

        let state = Arc::new(AppState::new(config, Arc::new(NoneAuthenticator), fetcher));
        let router = marquee_server::api::create_router(state);

        Self {
            router,
            tool,
            hook,
            media_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let (status, _, bytes) = self.send("GET", path, None).await;
        TestResponse {
            status,
            body: parse_json(&bytes),
        }
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        let (status, _, bytes) = self.send("POST", path, Some(body)).await;
        TestResponse {
            status,
            body: parse_json(&bytes),
        }
    }

    /// POST to the fetch endpoint and read the whole event stream.
    pub async fn fetch(&self, body: Value) -> StreamResponse {
        let (status, headers, bytes) = self.send("POST", "/api/v1/fetch", Some(body)).await;
        StreamResponse {
            status,
            headers,
            raw: String::from_utf8(bytes).expect("Body is not UTF-8"),
        }
    }

    /// GET /metrics as plain text.
    pub async fn fetch_metrics(&self) -> String {
        let (_, _, bytes) = self.send("GET", "/metrics", None).await;
        String::from_utf8(bytes).expect("Metrics are not UTF-8")
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Vec<u8>) {
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
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, headers, body_bytes.to_vec())
    }
}

fn parse_json(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(bytes).unwrap_or(Value::Null)
    }
}
