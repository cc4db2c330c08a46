//! `GET /api/stats` (SPEC_FULL.md §4.10).

use axum::extract::State;
use axum::Json;
use std::collections::BTreeMap;

use crate::app_state::AppState;
use crate::errors::AppError;

pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, i64>>, AppError> {
    let grouped = state.repo.group_by_status().await?;
    let by_name = grouped
        .into_iter()
        .map(|(status, count)| (status.as_str().to_string(), count))
        .collect();
    Ok(Json(by_name))
}
