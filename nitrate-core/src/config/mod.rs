//! The Config Subsystem (C9): a layered `RuntimeConfig` (defaults < env <
//! file < db < init overrides), blacklist-protected hot reload, and
//! per-key validation (SPEC_FULL.md §4.9).

mod defaults;
mod loader;
mod models;
mod validation;

pub use loader::load;
pub use models::RuntimeConfig;
pub use validation::validate_key;

/// Keys that `POST /api/config` may never accept, because they are either
/// security-sensitive or would let a request re-point the pipeline at a
/// different filesystem/provider out from under the Scanner and Resolver.
pub const BLACKLIST: &[&str] = &[
    "DATABASE_URL",
    "OPENAI_API_KEY",
    "TMDB_API_KEY",
    "SOURCE_DIR",
    "TARGET_DIR",
    "ENABLE_TMDB",
    "ENABLE_LLM",
];

/// Keys writable through the config API and persisted to `config_items`.
pub const EDITABLE_KEYS: &[&str] = &[
    "SCAN_INTERVAL_SECONDS",
    "SCAN_EXCLUDE_TARGET_DIR",
    "SCAN_FOLLOW_SYMLINKS",
    "MIN_FILE_SIZE_MB",
    "VIDEO_EXTENSIONS",
    "WORKER_COUNT",
    "TMDB_CONCURRENCY",
    "TMDB_LANGUAGE",
    "TMDB_HYBRID_FALLBACK",
    "PRODUCER_BATCH_SIZE",
    "PRODUCER_INTERVAL_SECONDS",
    "LOG_LEVEL",
    "CORS_ORIGINS",
];

/// The full recognized schema: every key the startup cleanup pass keeps,
/// blacklisted or not (SPEC_FULL.md §4.9's cleanup pass deletes rows whose
/// key falls outside this set, not just outside the editable subset).
pub fn schema_keys() -> Vec<&'static str> {
    BLACKLIST.iter().chain(EDITABLE_KEYS.iter()).copied().collect()
}

pub fn is_blacklisted(key: &str) -> bool {
    BLACKLIST.contains(&key)
}
