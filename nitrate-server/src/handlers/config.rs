//! `GET`/`POST /api/config` (SPEC_FULL.md §4.9): partitions a batch write
//! into {accepted, rejected}, persists the accepted subset, then forces a
//! full reload so every source is re-merged and republished.

use std::collections::{BTreeMap, HashMap};

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use nitrate_core::config::{self, BLACKLIST};
use nitrate_core::db::config_item;

use crate::app_state::AppState;
use crate::errors::AppError;

pub async fn get_config(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Value>>, AppError> {
    Ok(Json(state.config_snapshot().as_map()))
}

#[derive(Serialize)]
pub struct ConfigWriteResponse {
    updated_keys: Vec<String>,
    rejected_keys: Vec<String>,
}

pub async fn post_config(
    State(state): State<AppState>,
    Json(body): Json<HashMap<String, Value>>,
) -> Result<Json<ConfigWriteResponse>, AppError> {
    let mut updated_keys = Vec::new();
    let mut rejected_keys = Vec::new();
    let mut to_persist = Vec::new();

    for (key, value) in &body {
        if BLACKLIST.contains(&key.as_str()) {
            rejected_keys.push(key.clone());
            continue;
        }
        match config::validate_key(key, value) {
            Ok(validated) => to_persist.push((key.clone(), validated)),
            Err(_) => rejected_keys.push(key.clone()),
        }
    }

    for (key, value) in &to_persist {
        let encoded = serde_json::to_string(value)
            .map_err(|e| AppError::internal(format!("encoding {key}: {e}")))?;
        config_item::set(&state.pool, key, &encoded, None).await?;
        updated_keys.push(key.clone());
    }

    let reloaded = config::load(&state.pool, &HashMap::new()).await?;

    let resolver = state.provider.build(&reloaded)?;
    state
        .resolver
        .send(resolver)
        .map_err(|_| AppError::internal("resolver reload channel has no receivers"))?;

    state
        .config
        .send(std::sync::Arc::new(reloaded))
        .map_err(|_| AppError::internal("config reload channel has no receivers"))?;

    Ok(Json(ConfigWriteResponse {
        updated_keys,
        rejected_keys,
    }))
}
