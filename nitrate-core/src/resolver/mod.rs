//! The Identity Resolver (C3): filename -> [`FilenameGuess`] (Stage A, an
//! LLM) -> [`ResolvedRecord`] (Stage B, TMDB). Each stage is independently
//! cached and retried; a Worker drives both in sequence.

mod cache;
mod llm;
mod retry;
mod tmdb;
mod types;

pub use llm::{LlmConfig, LlmResolver};
pub use retry::{retry_async, RetryPolicy};
pub use tmdb::{TmdbConfig, TmdbResolver};
pub use types::{FilenameGuess, MediaType, ResolvedRecord};

use crate::error::Result;

/// Both Resolver stages, kept as a trait so the Worker (C7) can run against
/// a test double instead of live HTTP endpoints.
#[async_trait::async_trait]
pub trait Resolve: Send + Sync {
    /// Stage A.
    async fn guess(&self, filename: &str) -> Result<FilenameGuess>;
    /// Stage B.
    async fn identify(&self, guess: &FilenameGuess) -> Result<Option<ResolvedRecord>>;
}

pub struct IdentityResolver {
    llm: LlmResolver,
    tmdb: TmdbResolver,
}

impl IdentityResolver {
    pub fn new(llm_config: LlmConfig, tmdb_config: TmdbConfig) -> Result<Self> {
        Ok(Self {
            llm: LlmResolver::new(llm_config)?,
            tmdb: TmdbResolver::new(tmdb_config)?,
        })
    }
}

#[async_trait::async_trait]
impl Resolve for IdentityResolver {
    async fn guess(&self, filename: &str) -> Result<FilenameGuess> {
        self.llm.parse_filename(filename).await
    }

    async fn identify(&self, guess: &FilenameGuess) -> Result<Option<ResolvedRecord>> {
        self.tmdb.resolve(guess).await
    }
}
