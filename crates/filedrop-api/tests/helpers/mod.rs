//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p filedrop-api`.

#![allow(dead_code)]

pub mod fixtures;

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use filedrop_api::setup::routes;
use filedrop_api::state::AppState;
use filedrop_core::Config;
use filedrop_services::{ApiKeySet, LocalStorage, Storage};
use std::sync::Arc;
use tempfile::TempDir;

/// Test application: server, state, and the temp dir backing local storage.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.state.storage
    }

    pub fn files_dir(&self) -> std::path::PathBuf {
        self._temp_dir.path().join("files")
    }

    pub fn meta_dir(&self) -> std::path::PathBuf {
        self._temp_dir.path().join("meta")
    }
}

pub fn name(name: &'static str) -> HeaderName {
    HeaderName::from_static(name)
}

pub fn value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).expect("valid header value")
}

pub fn create_test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.files_path = temp_dir.path().join("files").display().to_string();
    config.meta_path = temp_dir.path().join("meta").display().to_string();
    config.max_size_bytes = 1024 * 1024;
    config
}

/// Setup test app with local storage in a temp dir.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}, None).await
}

/// Setup test app after adjusting the config, optionally requiring API keys.
pub async fn setup_test_app_with(
    configure: impl FnOnce(&mut Config),
    api_keys: Option<ApiKeySet>,
) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let mut config = create_test_config(&temp_dir);
    configure(&mut config);
    config.validate().expect("test config is valid");

    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(&config.files_path, &config.meta_path)
            .await
            .expect("Failed to create local storage"),
    );

    let config = Arc::new(config);
    let state = Arc::new(AppState::new(config.clone(), storage));
    let router = routes::setup_routes(&config, state.clone(), api_keys.map(Arc::new))
        .expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}
