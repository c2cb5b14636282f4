//! Test helpers: build the application over in-memory stores and a
//! temporary local blob store.
//!
//! Run with: `cargo test -p docshare-api`

#![allow(dead_code)]

pub mod auth;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use docshare_api::auth::create_resolver;
use docshare_api::setup::{build_state, routes};
use docshare_api::AppState;
use docshare_core::{Clock, Config, StorageBackend, SystemClock};
use std::sync::Arc;
use tempfile::TempDir;

pub const PUBLIC_BASE_URL: &str = "http://localhost:3000";
pub const URL_SIGNING_SECRET: &str = "test-url-signing-secret-at-least-32-chars";

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.base.public_base_url = PUBLIC_BASE_URL.to_string();
    config.storage.backend = StorageBackend::Local;
    config.storage.local_storage_path = temp_dir.path().to_string_lossy().to_string();
    config.storage.url_signing_secret = Some(URL_SIGNING_SECRET.to_string());
    config.auth.jwt_secret = Some(auth::JWT_SECRET.to_string());
    config
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}, Arc::new(SystemClock)).await
}

/// Build the app with a config tweak and a chosen clock.
pub async fn setup_test_app_with(
    configure: impl FnOnce(&mut Config),
    clock: Arc<dyn Clock>,
) -> TestApp {
    let temp_dir = TempDir::new().expect("temp dir");
    let mut config = test_config(&temp_dir);
    configure(&mut config);
    config.validate().expect("valid test config");

    let resolver = create_resolver(&config.auth).expect("resolver");
    let state = build_state(config, clock, resolver)
        .await
        .expect("app state");
    let router = routes::setup_routes(&state.config, state.clone()).expect("router");
    let server = TestServer::new(router).expect("test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

/// Upload `data` as `file_name` for the principal behind `token`.
pub async fn upload(server: &TestServer, token: &str, file_name: &str, data: &[u8]) -> TestResponse {
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(data.to_vec()).file_name(file_name.to_string()),
    );
    server
        .post("/api/files/upload")
        .add_header("Authorization", format!("Bearer {}", token))
        .multipart(form)
        .await
}

/// Upload a small PDF and return its storage path and file id.
pub async fn upload_pdf(server: &TestServer, token: &str, file_name: &str) -> (String, String) {
    let response = upload(server, token, file_name, b"%PDF-1.4 test document").await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    let body: serde_json::Value = response.json();
    (
        body["storage_path"].as_str().unwrap().to_string(),
        body["file_id"].as_str().unwrap().to_string(),
    )
}

/// Path and query of an absolute link produced by the service.
pub fn local_path(url: &str) -> String {
    url.strip_prefix(PUBLIC_BASE_URL)
        .expect("link on public base url")
        .to_string()
}
