use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;

use super::models::RuntimeConfig;
use super::validation::{apply_to, validate_key};
use super::schema_keys;
use crate::db::config_item;
use crate::error::Result;

/// Layer `defaults < env < db < overrides` into one `RuntimeConfig`
/// (SPEC_FULL.md §4.9). The dotfile layer is folded into `env` because
/// `dotenvy::dotenv()` populates the process environment before this runs
/// (SPEC_FULL.md A3, following ferrex's `ConfigLoader`).
///
/// Env and DB values that fail validation are logged and skipped rather
/// than aborting startup; `overrides` (CLI/init-time) are the top layer an
/// operator typed directly, so they fail loudly.
pub async fn load(pool: &SqlitePool, overrides: &HashMap<String, String>) -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::default();

    for key in schema_keys() {
        if let Ok(raw) = std::env::var(key) {
            apply_layer(&mut config, key, coerce_env_value(key, &raw));
        }
    }

    for row in config_item::list_all(pool).await? {
        if !schema_keys().contains(&row.key.as_str()) {
            continue;
        }
        match serde_json::from_str::<Value>(&row.value) {
            Ok(value) => apply_layer(&mut config, &row.key, value),
            Err(e) => {
                tracing::warn!(key = %row.key, error = %e, "discarding unparsable stored config value");
            }
        }
    }

    for (key, raw) in overrides {
        let value = coerce_env_value(key, raw);
        let validated = validate_key(key, &value)?;
        apply_to(&mut config, key, &validated)?;
    }

    let removed = config_item::delete_keys_not_in(pool, &schema_keys()).await?;
    if removed > 0 {
        tracing::info!(removed, "dropped config_items rows outside the current schema");
    }

    Ok(config)
}

fn apply_layer(config: &mut RuntimeConfig, key: &str, value: Value) {
    match validate_key(key, &value) {
        Ok(validated) => {
            if let Err(e) = apply_to(config, key, &validated) {
                tracing::warn!(key, error = %e, "failed to apply config layer value");
            }
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding invalid config layer value");
        }
    }
}

/// Best-effort conversion of a raw string (env var or CLI override) into
/// the JSON shape `validate_key` expects for this key.
fn coerce_env_value(key: &str, raw: &str) -> Value {
    match key {
        "SCAN_EXCLUDE_TARGET_DIR" | "SCAN_FOLLOW_SYMLINKS" | "TMDB_HYBRID_FALLBACK"
        | "ENABLE_LLM" | "ENABLE_TMDB" => Value::from(raw.eq_ignore_ascii_case("true") || raw == "1"),
        "SCAN_INTERVAL_SECONDS" | "MIN_FILE_SIZE_MB" | "WORKER_COUNT" | "TMDB_CONCURRENCY"
        | "PRODUCER_BATCH_SIZE" | "PRODUCER_INTERVAL_SECONDS" => raw
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(raw)),
        "VIDEO_EXTENSIONS" => Value::from(raw.split(',').map(str::trim).collect::<Vec<_>>()),
        _ => Value::from(raw),
    }
}
