//! End-to-end Control API tests driven through `tower::ServiceExt::oneshot`,
//! covering SPEC_FULL.md §8 scenarios 7 (retry gate) and 8 (config
//! blacklist) plus the list/stats/healthz wire contract.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tokio::sync::watch;
use tower::ServiceExt;

use nitrate_core::config::RuntimeConfig;
use nitrate_core::db::{self, MediaFile, NewMediaFile, Repository, Status, StatusPatch};

use nitrate_server::app_state::{AppState, ProviderBootstrap};
use nitrate_server::routes::build_router;

fn test_provider() -> ProviderBootstrap {
    ProviderBootstrap {
        llm_base_url: "https://api.openai.com/v1".to_string(),
        llm_api_key: String::new(),
        llm_model: "gpt-4o-mini".to_string(),
        llm_temperature: 0.2,
        llm_timeout: std::time::Duration::from_secs(30),
        tmdb_api_key: String::new(),
        tmdb_base_url: "https://api.themoviedb.org/3".to_string(),
        tmdb_timeout: std::time::Duration::from_secs(10),
    }
}

async fn test_state() -> AppState {
    let pool = db::connect("sqlite::memory:").await.unwrap();
    let runtime_config = RuntimeConfig::default();
    let provider = test_provider();
    let resolver = provider.build(&runtime_config).unwrap();
    let (config_tx, config_rx) = watch::channel(Arc::new(runtime_config));
    let (resolver_tx, resolver_rx) = watch::channel(resolver);
    std::mem::forget(config_rx);
    std::mem::forget(resolver_rx);
    AppState {
        repo: Repository::new(pool.clone()),
        pool,
        config: config_tx,
        resolver: resolver_tx,
        provider,
    }
}

async fn insert(repo: &Repository, inode: i64, name: &str) -> MediaFile {
    repo.insert(NewMediaFile {
        inode,
        device_id: 1,
        original_filepath: format!("/src/{name}"),
        original_filename: name.to_string(),
        file_size: 4096,
    })
    .await
    .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_reports_ok() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn list_files_rejects_invalid_status() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/files?status=NOT_A_STATUS")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn get_file_404_when_absent() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/api/files/999").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let detail = body_json(response).await;
    assert!(detail["detail"].as_str().unwrap().contains("999"));
}

/// SPEC_FULL.md §8 scenario 7: retry rejects non-terminal-failure statuses,
/// then accepts from FAILED and reports the previous/current pair.
#[tokio::test]
async fn retry_gate_rejects_completed_accepts_failed() {
    let state = test_state().await;
    let repo = state.repo.clone();
    let completed = insert(&repo, 1, "a.mkv").await;
    repo.update_status(completed.id, Status::Completed, None, &StatusPatch::default())
        .await
        .unwrap();

    let failed = insert(&repo, 2, "b.mkv").await;
    repo.update_status(failed.id, Status::Failed, Some("boom"), &StatusPatch::default())
        .await
        .unwrap();

    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/files/{}/retry", completed.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/files/{}/retry", failed.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["previous_status"], "FAILED");
    assert_eq!(payload["current_status"], "PENDING");

    let reloaded = repo.get_by_id(failed.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, Status::Pending);
}

/// SPEC_FULL.md §8 scenario 8: a blacklisted key in the same batch as an
/// editable key is rejected while the editable key is accepted, and the
/// rejection doesn't roll back the whole batch.
#[tokio::test]
async fn config_post_partitions_blacklisted_and_editable_keys() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/config")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"DATABASE_URL": "sqlite:///evil", "LOG_LEVEL": "ERROR"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["updated_keys"], json!(["LOG_LEVEL"]));
    assert_eq!(payload["rejected_keys"], json!(["DATABASE_URL"]));

    let response = app
        .oneshot(Request::builder().uri("/api/config").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let payload = body_json(response).await;
    assert_eq!(payload["LOG_LEVEL"], "ERROR");
    assert!(payload.get("DATABASE_URL").is_none());
}

#[tokio::test]
async fn batch_retry_reports_per_item_outcome() {
    let state = test_state().await;
    let repo = state.repo.clone();
    let failed = insert(&repo, 1, "a.mkv").await;
    repo.update_status(failed.id, Status::Failed, Some("boom"), &StatusPatch::default())
        .await
        .unwrap();

    let app = build_router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/files/batch-retry")
                .header("content-type", "application/json")
                .body(Body::from(json!({"file_ids": [failed.id, 9999]}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    let items = payload.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["success"], true);
    assert_eq!(items[1]["success"], false);
}

#[tokio::test]
async fn stats_groups_by_status() {
    let state = test_state().await;
    let repo = state.repo.clone();
    insert(&repo, 1, "a.mkv").await;
    insert(&repo, 2, "b.mkv").await;

    let app = build_router(state);
    let response = app
        .oneshot(Request::builder().uri("/api/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["PENDING"], 2);
}
