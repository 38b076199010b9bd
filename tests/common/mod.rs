//! Shared test utilities and fixtures

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use atlas_bootstrap::{HttpUnitLoader, Orchestrator, Runtime};
use atlas_config::AtlasConfig;
use atlas_events::{Event, EventBus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CORE_ASSETS: [&str; 3] = [
    "/assets/core/utils.js",
    "/assets/core/api-client.js",
    "/assets/core/ui.js",
];

/// Page with a CSRF token, a map container and a weather widget.
pub const PAGE: &str = r#"<!doctype html>
<html lang="fr">
<head>
  <meta charset="utf-8">
  <meta name="csrf-token" content="csrf-123">
  <title>Régions</title>
</head>
<body>
  <div id="map" data-lat="45.76" data-lng="4.83"></div>
  <aside data-weather="lyon"></aside>
</body>
</html>"#;

/// Serve every core unit asset with a 200.
pub async fn mount_core_assets(server: &MockServer) {
    for asset in CORE_ASSETS {
        mount_asset(server, asset).await;
    }
}

pub async fn mount_asset(server: &MockServer, asset: &str) {
    Mock::given(method("GET"))
        .and(path(asset))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/javascript")
                .set_body_string(format!("// {asset}")),
        )
        .mount(server)
        .await;
}

/// Config pointing both the API and the assets at `server`, with fast retries.
pub fn config_for(server: &MockServer) -> AtlasConfig {
    AtlasConfig {
        api_base_url: Some(format!("{}/api", server.uri())),
        assets_base_url: Some(server.uri()),
        retry_delay: Some(1),
        ..AtlasConfig::default()
    }
}

pub fn orchestrator_for(runtime: &Runtime, config: &AtlasConfig) -> Orchestrator {
    let loader = HttpUnitLoader::new(&config.assets_base_url()).unwrap();
    Orchestrator::new(runtime.clone(), Arc::new(loader))
}

/// Collect every event published under `name`.
pub fn record(bus: &EventBus, name: &str) -> Arc<Mutex<Vec<Event>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _ = bus.on(name, move |e: &Event| sink.lock().unwrap().push(e.clone()));
    seen
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
