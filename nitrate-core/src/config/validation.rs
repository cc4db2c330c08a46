use serde_json::{json, Value};

use super::models::RuntimeConfig;
use crate::error::{LibraryError, Result};

/// Validate and normalize a single config value against its key's
/// constraints (SPEC_FULL.md §4.9's table). Returns the normalized value
/// sent to storage, or an error naming the violated constraint.
pub fn validate_key(key: &str, value: &Value) -> Result<Value> {
    match key {
        "SOURCE_DIR" | "TARGET_DIR" => {
            let s = as_nonempty_str(key, value)?;
            Ok(json!(s))
        }
        "SCAN_INTERVAL_SECONDS" => {
            let v = as_range_u64(key, value, 60, 3600)?;
            Ok(json!(v))
        }
        "SCAN_EXCLUDE_TARGET_DIR" | "SCAN_FOLLOW_SYMLINKS" | "TMDB_HYBRID_FALLBACK"
        | "ENABLE_LLM" | "ENABLE_TMDB" => Ok(json!(as_bool(key, value)?)),
        "MIN_FILE_SIZE_MB" => Ok(json!(as_range_u64(key, value, 0, u64::MAX)?)),
        "VIDEO_EXTENSIONS" => Ok(json!(validate_extensions(value)?)),
        "WORKER_COUNT" => Ok(json!(as_range_u64(key, value, 1, 10)?)),
        "TMDB_CONCURRENCY" => Ok(json!(as_range_u64(key, value, 1, 20)?)),
        "TMDB_LANGUAGE" => {
            let s = as_nonempty_str(key, value)?;
            if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(LibraryError::ConfigValidation(format!(
                    "{key} must be alphanumeric/dash, got '{s}'"
                )));
            }
            Ok(json!(s))
        }
        "PRODUCER_BATCH_SIZE" => Ok(json!(as_range_u64(key, value, 1, u64::MAX)? as i64)),
        "PRODUCER_INTERVAL_SECONDS" => Ok(json!(as_range_u64(key, value, 1, u64::MAX)?)),
        "LOG_LEVEL" => {
            let s = as_nonempty_str(key, value)?.to_ascii_uppercase();
            if !["TRACE", "DEBUG", "INFO", "WARN", "ERROR"].contains(&s.as_str()) {
                return Err(LibraryError::ConfigValidation(format!(
                    "{key} must be one of TRACE/DEBUG/INFO/WARN/ERROR, got '{s}'"
                )));
            }
            Ok(json!(s))
        }
        "CORS_ORIGINS" => Ok(json!(validate_cors_origins(value)?)),
        "DATABASE_URL" | "OPENAI_API_KEY" | "TMDB_API_KEY" => Ok(value.clone()),
        other => Err(LibraryError::ConfigValidation(format!(
            "unrecognized config key '{other}'"
        ))),
    }
}

/// Apply an already-validated value to the field it names.
pub fn apply_to(config: &mut RuntimeConfig, key: &str, value: &Value) -> Result<()> {
    macro_rules! str_field {
        ($field:ident) => {
            config.$field = value
                .as_str()
                .ok_or_else(|| LibraryError::Internal(format!("{} is not a string", key)))?
                .to_string()
        };
    }
    macro_rules! bool_field {
        ($field:ident) => {
            config.$field = value
                .as_bool()
                .ok_or_else(|| LibraryError::Internal(format!("{} is not a bool", key)))?
        };
    }
    macro_rules! u64_field {
        ($field:ident) => {
            config.$field = value
                .as_u64()
                .ok_or_else(|| LibraryError::Internal(format!("{} is not a u64", key)))?
        };
    }

    match key {
        "SOURCE_DIR" => str_field!(source_dir),
        "TARGET_DIR" => str_field!(target_dir),
        "SCAN_INTERVAL_SECONDS" => u64_field!(scan_interval_seconds),
        "SCAN_EXCLUDE_TARGET_DIR" => bool_field!(scan_exclude_target_dir),
        "SCAN_FOLLOW_SYMLINKS" => bool_field!(scan_follow_symlinks),
        "TMDB_HYBRID_FALLBACK" => bool_field!(tmdb_hybrid_fallback),
        "ENABLE_LLM" => bool_field!(enable_llm),
        "ENABLE_TMDB" => bool_field!(enable_tmdb),
        "MIN_FILE_SIZE_MB" => u64_field!(min_file_size_mb),
        "VIDEO_EXTENSIONS" => {
            config.video_extensions = value
                .as_array()
                .ok_or_else(|| LibraryError::Internal("VIDEO_EXTENSIONS is not an array".into()))?
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
        }
        "WORKER_COUNT" => {
            config.worker_count = value
                .as_u64()
                .ok_or_else(|| LibraryError::Internal("WORKER_COUNT is not a u64".into()))?
                as usize
        }
        "TMDB_CONCURRENCY" => {
            config.tmdb_concurrency = value
                .as_u64()
                .ok_or_else(|| LibraryError::Internal("TMDB_CONCURRENCY is not a u64".into()))?
                as usize
        }
        "TMDB_LANGUAGE" => str_field!(tmdb_language),
        "PRODUCER_BATCH_SIZE" => {
            config.producer_batch_size = value
                .as_i64()
                .ok_or_else(|| LibraryError::Internal("PRODUCER_BATCH_SIZE is not an i64".into()))?
        }
        "PRODUCER_INTERVAL_SECONDS" => u64_field!(producer_interval_seconds),
        "LOG_LEVEL" => str_field!(log_level),
        "CORS_ORIGINS" => str_field!(cors_origins),
        "DATABASE_URL" | "OPENAI_API_KEY" | "TMDB_API_KEY" => {
            // Bootstrap-only secrets: not part of RuntimeConfig, nothing to set.
        }
        other => {
            return Err(LibraryError::ConfigValidation(format!(
                "unrecognized config key '{other}'"
            )))
        }
    }
    Ok(())
}

fn as_bool(key: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| LibraryError::ConfigValidation(format!("{key} must be a boolean")))
}

fn as_nonempty_str(key: &str, value: &Value) -> Result<String> {
    let s = value
        .as_str()
        .ok_or_else(|| LibraryError::ConfigValidation(format!("{key} must be a string")))?
        .trim();
    if s.is_empty() {
        return Err(LibraryError::ConfigValidation(format!(
            "{key} must not be empty"
        )));
    }
    Ok(s.to_string())
}

fn as_range_u64(key: &str, value: &Value, min: u64, max: u64) -> Result<u64> {
    let v = value
        .as_u64()
        .or_else(|| value.as_i64().filter(|n| *n >= 0).map(|n| n as u64))
        .ok_or_else(|| LibraryError::ConfigValidation(format!("{key} must be a non-negative integer")))?;
    if v < min || v > max {
        return Err(LibraryError::ConfigValidation(format!(
            "{key} must be between {min} and {max}, got {v}"
        )));
    }
    Ok(v)
}

fn validate_extensions(value: &Value) -> Result<Vec<String>> {
    let raw: Vec<String> = if let Some(arr) = value.as_array() {
        arr.iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    } else if let Some(s) = value.as_str() {
        s.split(',').map(|s| s.trim().to_string()).collect()
    } else {
        return Err(LibraryError::ConfigValidation(
            "VIDEO_EXTENSIONS must be an array or comma-separated string".to_string(),
        ));
    };

    if raw.is_empty() {
        return Err(LibraryError::ConfigValidation(
            "VIDEO_EXTENSIONS must not be empty".to_string(),
        ));
    }

    raw.into_iter()
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            let body = ext.strip_prefix('.').ok_or_else(|| {
                LibraryError::ConfigValidation(format!("extension '{ext}' must begin with '.'"))
            })?;
            if body.is_empty() || !body.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(LibraryError::ConfigValidation(format!(
                    "extension '{ext}' must be alphanumeric after the dot"
                )));
            }
            Ok(ext)
        })
        .collect()
}

fn validate_cors_origins(value: &Value) -> Result<String> {
    let s = as_nonempty_str("CORS_ORIGINS", value)?;
    if s == "*" {
        return Ok(s);
    }
    for origin in s.split(',') {
        let origin = origin.trim();
        url::Url::parse(origin).map_err(|_| {
            LibraryError::ConfigValidation(format!("CORS_ORIGINS entry '{origin}' is not a URL"))
        })?;
    }
    Ok(s)
}
