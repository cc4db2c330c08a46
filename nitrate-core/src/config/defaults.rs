use super::models::RuntimeConfig;

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            source_dir: String::new(),
            target_dir: String::new(),
            scan_interval_seconds: 300,
            scan_exclude_target_dir: true,
            scan_follow_symlinks: false,
            min_file_size_mb: 10,
            video_extensions: [
                ".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".webm", ".m4v",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            enable_llm: true,
            enable_tmdb: true,
            worker_count: 2,
            tmdb_concurrency: 10,
            tmdb_language: "zh-CN".to_string(),
            tmdb_hybrid_fallback: false,
            producer_batch_size: 10,
            producer_interval_seconds: 5,
            log_level: "INFO".to_string(),
            cors_origins: "*".to_string(),
        }
    }
}
