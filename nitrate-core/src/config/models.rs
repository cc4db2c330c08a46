use serde::{Deserialize, Serialize};

/// The materialized configuration every pipeline component reads through
/// an `Arc<RuntimeConfig>` swap, per SPEC_FULL.md §9 ("reload publishes a
/// fresh Arc rather than mutating in place").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub source_dir: String,
    pub target_dir: String,
    pub scan_interval_seconds: u64,
    pub scan_exclude_target_dir: bool,
    pub scan_follow_symlinks: bool,
    pub min_file_size_mb: u64,
    pub video_extensions: Vec<String>,
    pub enable_llm: bool,
    pub enable_tmdb: bool,
    pub worker_count: usize,
    pub tmdb_concurrency: usize,
    pub tmdb_language: String,
    pub tmdb_hybrid_fallback: bool,
    pub producer_batch_size: i64,
    pub producer_interval_seconds: u64,
    pub log_level: String,
    pub cors_origins: String,
}

impl RuntimeConfig {
    /// Fetch a field by its config-key name, JSON-encoded, for the
    /// `GET /api/config` response and for persisting to `config_items`.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        use serde_json::json;
        Some(match key {
            "SOURCE_DIR" => json!(self.source_dir),
            "TARGET_DIR" => json!(self.target_dir),
            "SCAN_INTERVAL_SECONDS" => json!(self.scan_interval_seconds),
            "SCAN_EXCLUDE_TARGET_DIR" => json!(self.scan_exclude_target_dir),
            "SCAN_FOLLOW_SYMLINKS" => json!(self.scan_follow_symlinks),
            "MIN_FILE_SIZE_MB" => json!(self.min_file_size_mb),
            "VIDEO_EXTENSIONS" => json!(self.video_extensions),
            "ENABLE_LLM" => json!(self.enable_llm),
            "ENABLE_TMDB" => json!(self.enable_tmdb),
            "WORKER_COUNT" => json!(self.worker_count),
            "TMDB_CONCURRENCY" => json!(self.tmdb_concurrency),
            "TMDB_LANGUAGE" => json!(self.tmdb_language),
            "TMDB_HYBRID_FALLBACK" => json!(self.tmdb_hybrid_fallback),
            "PRODUCER_BATCH_SIZE" => json!(self.producer_batch_size),
            "PRODUCER_INTERVAL_SECONDS" => json!(self.producer_interval_seconds),
            "LOG_LEVEL" => json!(self.log_level),
            "CORS_ORIGINS" => json!(self.cors_origins),
            _ => return None,
        })
    }

    pub fn as_map(&self) -> std::collections::BTreeMap<String, serde_json::Value> {
        crate::config::schema_keys()
            .into_iter()
            .filter_map(|key| self.get(key).map(|v| (key.to_string(), v)))
            .collect()
    }
}
