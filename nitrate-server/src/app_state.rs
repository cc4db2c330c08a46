//! The axum `State` extractor payload: the handful of handles a handler
//! needs, cloned cheaply per-request (ferrex's `main.rs` builds an
//! equivalent `AppState` of `Arc`'d services; ours is scoped to the things
//! SPEC_FULL.md's Control API actually touches).

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::watch;

use nitrate_core::config::RuntimeConfig;
use nitrate_core::db::Repository;
use nitrate_core::resolver::{IdentityResolver, LlmConfig, Resolve, TmdbConfig};

/// The provider settings that never come from `RuntimeConfig` (secrets and
/// transport knobs fixed at process start). `POST /api/config` rebuilds a
/// resolver by pairing this with a fresh `RuntimeConfig` snapshot, so edits
/// to `TMDB_CONCURRENCY`/`TMDB_LANGUAGE` take effect without a restart.
#[derive(Clone)]
pub struct ProviderBootstrap {
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_timeout: Duration,
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub tmdb_timeout: Duration,
}

impl ProviderBootstrap {
    pub fn build(&self, runtime: &RuntimeConfig) -> nitrate_core::error::Result<Arc<dyn Resolve>> {
        let resolver = IdentityResolver::new(
            LlmConfig {
                base_url: self.llm_base_url.clone(),
                api_key: self.llm_api_key.clone(),
                model: self.llm_model.clone(),
                temperature: self.llm_temperature,
                timeout: self.llm_timeout,
            },
            TmdbConfig {
                api_key: self.tmdb_api_key.clone(),
                base_url: self.tmdb_base_url.clone(),
                concurrency: runtime.tmdb_concurrency,
                hybrid_fallback: runtime.tmdb_hybrid_fallback,
                language: runtime.tmdb_language.clone(),
                timeout: self.tmdb_timeout,
            },
        )?;
        Ok(Arc::new(resolver))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
    pub pool: SqlitePool,
    pub config: watch::Sender<Arc<RuntimeConfig>>,
    pub resolver: watch::Sender<Arc<dyn Resolve>>,
    pub provider: ProviderBootstrap,
}

impl AppState {
    pub fn config_snapshot(&self) -> Arc<RuntimeConfig> {
        self.config.borrow().clone()
    }
}
