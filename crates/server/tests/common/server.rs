//! Server test utilities.

use axum::body::Body;
use axum::http::{Request, Response};
use folio_core::config::AppConfig;
use folio_server::{AppState, create_router};
use std::path::PathBuf;
use tempfile::TempDir;
use tower::ServiceExt;

/// A test server wrapper with its base and cache directories.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

/// A buffered response.
#[allow(dead_code)]
pub struct TestResponse {
    pub status: axum::http::StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

#[allow(dead_code)]
impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary base and cache directories.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let base_dir = temp_dir.path().join("descarga");
        std::fs::create_dir_all(&base_dir).expect("Failed to create base directory");
        let cache_dir = temp_dir.path().join("zip-cache");

        let mut config = AppConfig::for_testing(base_dir, cache_dir);

        // Apply user modifications
        modifier(&mut config);

        let state = AppState::from_config(config)
            .await
            .expect("Failed to create app state");
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Base directory downloads are resolved under.
    pub fn base_dir(&self) -> PathBuf {
        self.state.config.archive.base_dir.clone()
    }

    /// Directory holding built archives.
    pub fn cache_dir(&self) -> PathBuf {
        self.state.config.archive.cache_dir.clone()
    }

    /// Create `<base>/<folder>` with the given files.
    pub fn create_folder(&self, folder: &str, files: &[(&str, usize)]) -> PathBuf {
        let dir = self.base_dir().join(folder);
        std::fs::create_dir_all(&dir).expect("Failed to create folder");
        super::fixtures::write_files(&dir, files);
        dir
    }

    /// Send a GET with optional extra headers and buffer the response.
    pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request("GET", uri, headers).await
    }

    /// Send a request and buffer the response.
    pub async fn request(&self, method: &str, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::empty()).unwrap();
        let response: Response<Body> = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }
}
