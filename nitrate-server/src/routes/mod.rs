//! Router composition, following ferrex's `routes/v1.rs` pattern
//! (`Router::new()` chained with `.route()`/`.merge()`) scoped to
//! SPEC_FULL.md §4.10's endpoint list. No auth middleware: this API has no
//! concept of users.

use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;
use crate::handlers::{config, files, health, stats};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(files_routes())
        .merge(config_routes())
        .route("/api/stats", get(stats::get_stats))
        .route("/healthz", get(health::healthz))
        .with_state(state)
}

fn files_routes() -> Router<AppState> {
    Router::new()
        .route("/api/files", get(files::list_files))
        .route("/api/files/suggest", get(files::suggest_files))
        .route("/api/files/{id}", get(files::get_file))
        .route("/api/files/{id}/retry", post(files::retry_file))
        .route("/api/files/batch-retry", post(files::batch_retry))
        .route("/api/files/batch-delete", post(files::batch_delete))
}

fn config_routes() -> Router<AppState> {
    Router::new().route(
        "/api/config",
        get(config::get_config).post(config::post_config),
    )
}
