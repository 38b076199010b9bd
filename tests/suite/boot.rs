//! End-to-end boots against a mock asset and API server.

use atlas_api::{ApiClient, CSRF_HEADER};
use atlas_bootstrap::foundation::{API, UI, UTILS};
use atlas_bootstrap::{Asset, BootState, FeatureBundle, Runtime, Ui};
use atlas_config::FeatureConfig;
use atlas_events::Event;
use atlas_types::names;
use atlas_utils::Utils;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    CORE_ASSETS, PAGE, config_for, mount_asset, mount_core_assets, orchestrator_for, record,
};

fn configured(name: &str, selector: &str) -> FeatureBundle {
    FeatureBundle::from_config(&FeatureConfig {
        name: name.into(),
        selector: selector.into(),
        asset: format!("/assets/features/{name}.js"),
    })
}

#[tokio::test]
async fn full_boot_wires_api_module_with_csrf() {
    let server = MockServer::start().await;
    mount_core_assets(&server).await;
    mount_asset(&server, "/assets/features/map.js").await;
    Mock::given(method("POST"))
        .and(path("/api/regions"))
        .and(header(CSRF_HEADER, "csrf-123"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "id": 9 })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let runtime = Runtime::new(config.clone());
    let initialized = record(runtime.bus(), names::APP_INITIALIZED);

    let mut orchestrator = orchestrator_for(&runtime, &config)
        .with_feature(configured("map", "#map"))
        .with_feature(configured("gallery", ".gallery"));
    let report = orchestrator.boot(PAGE).await.unwrap();

    assert_eq!(report.state, BootState::FeaturesReady);
    assert_eq!(report.core_units, vec![UTILS, API, UI]);
    assert_eq!(report.features_loaded, vec!["map"]);
    assert!(report.csrf_token_found);
    assert_eq!(
        *initialized.lock().unwrap(),
        vec![Event::AppInitialized {
            modules: vec![UTILS.into(), API.into(), UI.into()],
        }]
    );

    let map = runtime.modules().get_as::<Asset>("map").unwrap();
    assert_eq!(map.body, "// /assets/features/map.js");

    let api = runtime.modules().get_as::<ApiClient>(API).unwrap();
    let created = api
        .post("/regions", serde_json::json!({ "name": "Auvergne" }))
        .await
        .unwrap();
    assert_eq!(created.into_json()["id"], 9);
}

#[tokio::test]
async fn core_asset_failure_falls_back_to_minimal_capabilities() {
    let server = MockServer::start().await;
    mount_asset(&server, CORE_ASSETS[0]).await;
    Mock::given(method("GET"))
        .and(path(CORE_ASSETS[1]))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CORE_ASSETS[2]))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let runtime = Runtime::new(config.clone());
    let fallback = record(runtime.bus(), names::APP_FALLBACK);

    let mut orchestrator =
        orchestrator_for(&runtime, &config).with_feature(configured("map", "#map"));
    let report = orchestrator.boot(PAGE).await.unwrap();

    assert_eq!(report.state, BootState::Fallback);
    assert_eq!(report.core_units, vec![UTILS]);
    assert!(report.features_loaded.is_empty());
    let reason = report.fallback_reason.as_deref().unwrap();
    assert!(reason.contains("500"), "{reason}");
    assert_eq!(fallback.lock().unwrap().len(), 1);

    // Fallback capabilities are in place and usable.
    let utils = runtime.modules().load_as::<Utils>(UTILS).await.unwrap();
    assert_eq!(utils.escape_html("<b>"), "&lt;b&gt;");
    assert!(runtime.modules().get_as::<Ui>(UI).is_some());
    assert!(runtime.modules().get(API).is_none());
}

#[tokio::test]
async fn failing_feature_is_skipped() {
    let server = MockServer::start().await;
    mount_core_assets(&server).await;
    mount_asset(&server, "/assets/features/weather.js").await;
    Mock::given(method("GET"))
        .and(path("/assets/features/map.js"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let runtime = Runtime::new(config.clone());
    let failed = record(runtime.bus(), names::FEATURE_FAILED);
    let loaded = record(runtime.bus(), names::FEATURE_LOADED);

    let mut orchestrator = orchestrator_for(&runtime, &config)
        .with_feature(configured("map", "#map"))
        .with_feature(configured("weather", "[data-weather]"));
    let report = orchestrator.boot(PAGE).await.unwrap();

    assert_eq!(report.state, BootState::FeaturesReady);
    assert_eq!(report.features_loaded, vec!["weather"]);
    assert_eq!(report.features_failed.len(), 1);
    assert_eq!(report.features_failed[0].feature, "map");
    assert_eq!(failed.lock().unwrap().len(), 1);
    assert_eq!(loaded.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn api_events_flow_through_the_runtime_bus() {
    let server = MockServer::start().await;
    mount_core_assets(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let runtime = Runtime::new(config.clone());
    let errors = record(runtime.bus(), names::API_ERROR);
    orchestrator_for(&runtime, &config)
        .boot("<html></html>")
        .await
        .unwrap();

    let api = runtime.modules().get_as::<ApiClient>(API).unwrap();
    let err = api
        .request("/weather", atlas_api::RequestOptions::get().retry(1))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(503));

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, Event::ApiError(f) if f.status == Some(503)))
    );
}
