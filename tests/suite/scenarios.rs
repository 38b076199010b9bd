//! Acceptance scenarios across the event bus, module registry and API client.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use atlas_api::{ApiClient, ApiConfig, ApiError, RequestOptions};
use atlas_events::{Event, EventBus};
use atlas_modules::{BoxError, Dependencies, ModuleError, ModuleRegistry};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::ms;

fn client(server: &MockServer) -> ApiClient {
    let config = ApiConfig::default()
        .with_base_url(format!("{}/api", server.uri()))
        .with_retry_delay(ms(1));
    ApiClient::new(config, EventBus::new()).unwrap()
}

#[tokio::test]
async fn dependency_factory_runs_once_for_dependent() {
    let registry = ModuleRegistry::new();
    let a_calls = Arc::new(AtomicUsize::new(0));

    let calls = Arc::clone(&a_calls);
    registry.register("a", &[], move |_: Dependencies| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, BoxError>("A".to_string()) }
    });
    registry.register("b", &["a"], |deps: Dependencies| async move {
        let a = deps.get::<String>("a")?;
        Ok::<_, BoxError>(format!("B({a})"))
    });

    let b = registry.load_as::<String>("b").await.unwrap();
    assert_eq!(*b, "B(A)");
    registry.load("b").await.unwrap();
    registry.load("a").await.unwrap();
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mutual_dependency_fails_naming_both() {
    let registry = ModuleRegistry::new();
    registry.register("x", &["y"], |_: Dependencies| async {
        Ok::<_, BoxError>(())
    });
    registry.register("y", &["x"], |_: Dependencies| async {
        Ok::<_, BoxError>(())
    });

    let err = tokio::time::timeout(ms(1_000), registry.load("x"))
        .await
        .expect("cycle detection must not hang")
        .unwrap_err();

    match &err {
        ModuleError::CircularDependency { cycle } => assert_eq!(cycle, &["x", "y", "x"]),
        other => panic!("expected CircularDependency, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains('x') && message.contains('y'), "{message}");
}

#[tokio::test]
async fn unresponsive_endpoint_times_out_near_the_bound() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(ms(5_000)))
        .mount(&server)
        .await;

    let api = client(&server);
    let started = Instant::now();
    let err = api
        .request("/slow", RequestOptions::get().timeout(ms(50)))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Timeout { .. }), "got {err:?}");
    assert!(started.elapsed() < ms(1_000));
}

#[tokio::test]
async fn repeated_get_within_ttl_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/regions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!([{ "id": 1 }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    api.get("/regions").await.unwrap();
    let rate_before = api.stats().cache_hit_rate;
    api.get("/regions").await.unwrap();

    let stats = api.stats();
    assert_eq!(stats.requests, 1);
    assert_eq!(stats.cache_hits, 1);
    assert!(stats.cache_hit_rate > rate_before);
}

#[tokio::test]
async fn server_error_with_retry_two_makes_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/regions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let bus = EventBus::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&attempts);
    let _ = bus.on(atlas_types::names::API_ERROR, move |_: &Event| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let config = ApiConfig::default()
        .with_base_url(format!("{}/api", server.uri()))
        .with_retry_delay(ms(1));
    let api = ApiClient::new(config, bus).unwrap();
    let err = api
        .request("/regions", RequestOptions::get().retry(2))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Http { status: 500, .. }));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn panicking_listener_does_not_starve_others() {
    let bus = EventBus::new();
    let delivered = Arc::new(AtomicUsize::new(0));
    for i in 0..5 {
        let delivered = Arc::clone(&delivered);
        let _ = bus.on("tick", move |_: &Event| {
            assert!(i != 2, "listener {i} fails");
            delivered.fetch_add(1, Ordering::SeqCst);
        });
    }

    let invoked = bus.emit(&Event::custom("tick", serde_json::Value::Null));
    assert_eq!(invoked, 4);
    assert_eq!(delivered.load(Ordering::SeqCst), 4);
}
