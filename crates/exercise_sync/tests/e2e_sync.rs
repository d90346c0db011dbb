use std::sync::Arc;
use std::time::Duration;

use exercise_catalog_client::CatalogClient;
use exercise_catalog_client::config::Config;
use exercise_catalog_client::http_client::ReqwestCatalogClient;
use exercise_catalog_client::retry::RetryPolicy;
use exercise_sync::mapper::map_remote_now;
use exercise_sync::{
    CatalogStore, InMemoryCatalogStore, LoggingMiddleware, SyncCoordinator, SyncEngine,
    SyncError, SyncOptions, SyncStatus, TokioBackgroundExecutor,
};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(i: usize) -> Value {
    json!({
        "exerciseId": format!("ex-{i}"),
        "name": format!("Exercise {i}"),
        "gifUrl": format!("https://img.example/{i}.gif"),
        "bodyParts": ["chest"],
        "equipments": ["dumbbell"],
        "targetMuscles": ["pectorals"],
        "instructions": ["Lie down", "Press"],
        "exerciseTips": ["a", "b", "c", "d"],
        "variations": ["Incline", "Decline"]
    })
}

async fn mount_page(server: &MockServer, offset: usize, limit: usize, body: Value) {
    Mock::given(method("GET"))
        .and(path("/exercises"))
        .and(query_param("offset", offset.to_string()))
        .and(query_param("limit", limit.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn pipeline(
    server: &MockServer,
    store: Arc<InMemoryCatalogStore>,
    page_size: u32,
    retry: RetryPolicy,
) -> SyncCoordinator {
    let config = Config {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
        ..Config::default()
    };
    let client = LoggingMiddleware::new(ReqwestCatalogClient::new(&config).expect("client"));
    let engine = SyncEngine::new(Arc::new(client), store).with_retry_policy(retry);
    SyncCoordinator::new(
        Arc::new(TokioBackgroundExecutor::new(engine)),
        SyncOptions {
            page_size,
            limit: None,
        },
    )
}

#[tokio::test]
async fn full_sync_walks_every_page_into_the_store() {
    let server = MockServer::start().await;
    mount_page(&server, 0, 10, Value::Array((0..10).map(record).collect())).await;
    mount_page(&server, 10, 10, Value::Array((10..20).map(record).collect())).await;
    mount_page(&server, 20, 10, Value::Array((20..23).map(record).collect())).await;

    let store = Arc::new(InMemoryCatalogStore::new());
    let coordinator = pipeline(&server, store.clone(), 10, RetryPolicy::default());

    assert_eq!(coordinator.sync_and_wait().await.expect("sync"), 23);
    assert_eq!(coordinator.current_status(), SyncStatus::success(23));
    assert_eq!(store.count().await.unwrap(), 23);

    let stored = store.get_by_remote_id("ex-22").await.unwrap().expect("ex-22");
    assert_eq!(stored.name, "Exercise 22");
    assert_eq!(stored.image_path.as_deref(), Some("https://img.example/22.gif"));
    assert_eq!(stored.common_mistakes, r#"["a","b","c"]"#);
    assert_eq!(stored.safety_tips, r#"["d"]"#);
    assert_eq!(stored.variations_beginner, r#"["Incline"]"#);
    assert_eq!(stored.variations_advanced, r#"["Decline"]"#);
    assert!(!stored.is_custom);
}

#[tokio::test]
async fn resync_is_idempotent_and_keeps_custom_records() {
    let server = MockServer::start().await;
    mount_page(&server, 0, 10, Value::Array((0..4).map(record).collect())).await;

    let store = Arc::new(InMemoryCatalogStore::new());
    let mut mine = map_remote_now(&serde_json::from_value(record(2)).expect("record"));
    mine.name = "My own variant".into();
    let custom_id = store.insert_custom(mine).await.unwrap();

    let coordinator = pipeline(&server, store.clone(), 10, RetryPolicy::default());
    assert_eq!(coordinator.sync_and_wait().await.expect("first"), 4);
    coordinator.reset();
    assert_eq!(coordinator.sync_and_wait().await.expect("second"), 4);

    assert_eq!(store.count().await.unwrap(), 4);
    let kept = store.get_by_remote_id("ex-2").await.unwrap().expect("ex-2");
    assert_eq!(kept.id, custom_id);
    assert_eq!(kept.name, "My own variant");
    assert!(kept.is_custom);
}

#[tokio::test]
async fn envelope_next_page_drives_pagination() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        0,
        2,
        json!({"metadata": {"nextPage": "/exercises?offset=2&limit=2"}, "data": [record(0), record(1)]}),
    )
    .await;
    mount_page(
        &server,
        2,
        2,
        json!({"metadata": {"nextPage": null}, "data": [record(2), record(3)]}),
    )
    .await;

    let store = Arc::new(InMemoryCatalogStore::new());
    let coordinator = pipeline(&server, store.clone(), 2, RetryPolicy::default());
    assert_eq!(coordinator.sync_and_wait().await.expect("sync"), 4);
    assert_eq!(store.count().await.unwrap(), 4);
}

#[tokio::test]
async fn server_errors_exhaust_retries_and_keep_applied_pages() {
    let server = MockServer::start().await;
    mount_page(&server, 0, 5, Value::Array((0..5).map(record).collect())).await;
    Mock::given(method("GET"))
        .and(path("/exercises"))
        .and(query_param("offset", "5"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(3)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryCatalogStore::new());
    let retry = RetryPolicy {
        max_retries: 2,
        base_delay: Duration::ZERO,
    };
    let coordinator = pipeline(&server, store.clone(), 5, retry);

    let err = coordinator.sync_and_wait().await.unwrap_err();
    match err {
        SyncError::Session(message) => assert!(message.contains("500"), "{message}"),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(matches!(coordinator.current_status(), SyncStatus::Error { .. }));
    assert_eq!(store.count().await.unwrap(), 5);
    server.verify().await;
}

#[tokio::test]
async fn search_goes_through_the_middleware() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/exercises/search"))
        .and(query_param("q", "exercise 1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([record(1)])))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        base_url: server.uri(),
        ..Config::default()
    };
    let client = LoggingMiddleware::new(ReqwestCatalogClient::new(&config).expect("client"));
    let found = client.search("exercise 1").await.expect("search");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].exercise_id, "ex-1");
}
