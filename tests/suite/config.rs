//! Config files flowing through the runtime into the API client.

use std::fs;
use std::time::Duration;

use atlas_api::{ApiError, RetryPolicy};
use atlas_bootstrap::Runtime;
use atlas_config::{AtlasConfig, ConfigError};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn file_values_survive_default_merge() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r##"
apiBaseUrl = "https://regions.example/api"
apiTimeout = 2500
retryPolicy = "classified"
locale = "fr"

[[features]]
name = "map"
selector = "#map"
asset = "/assets/features/map.js"
"##,
    );

    let runtime = Runtime::new(AtlasConfig::load_from(&path).unwrap());
    runtime.config().merge_defaults();
    let config = runtime.config().snapshot();

    assert_eq!(config.locale(), "fr");
    assert_eq!(config.debug, Some(false));
    assert_eq!(config.assets_base_url(), "https://regions.example");
    assert_eq!(config.features.len(), 1);
    assert_eq!(config.features[0].selector, "#map");

    let api = config.api_config();
    assert_eq!(api.base_url, "https://regions.example/api");
    assert_eq!(api.timeout, Duration::from_millis(2500));
    assert_eq!(api.retry_policy, RetryPolicy::Classified);
    assert_eq!(api.cache_ttl, Duration::from_secs(300));
}

#[test]
fn unknown_keys_are_rejected_with_the_path() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "apiTimeOut = 10\n");

    let err = AtlasConfig::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(err.path(), &path);
}

#[tokio::test]
async fn classified_policy_from_file_skips_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/regions/99"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        &format!(
            "apiBaseUrl = \"{}/api\"\nretryPolicy = \"classified\"\nretryDelay = 1\n",
            server.uri()
        ),
    );

    let runtime = Runtime::new(AtlasConfig::load_from(&path).unwrap());
    let api = runtime.config().api_client(runtime.bus().clone()).unwrap();
    let err = api
        .request("/regions/99", atlas_api::RequestOptions::get().retry(3))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Http { status: 404, .. }));
    assert_eq!(api.stats().requests, 1);
}
