//! Workers (C7): pop a queued id, run Resolver → Planner → Linker, and
//! write the terminal state through the Status Manager (SPEC_FULL.md §4.7).

use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio::sync::{watch, Mutex};

use super::status::StatusManager;
use crate::config::RuntimeConfig;
use crate::db::{MediaFile, Repository, StatusPatch};
use crate::error::{LibraryError, Result};
use crate::linker::{self, LinkResult};
use crate::planner;
use crate::resolver::Resolve;

enum Outcome {
    Completed,
    NoMatch,
    Conflict(String),
}

pub struct Worker {
    id: usize,
    repo: Repository,
    status: StatusManager,
    resolver: watch::Receiver<Arc<dyn Resolve>>,
}

impl Worker {
    pub fn new(
        id: usize,
        repo: Repository,
        status: StatusManager,
        resolver: watch::Receiver<Arc<dyn Resolve>>,
    ) -> Self {
        Self {
            id,
            repo,
            status,
            resolver,
        }
    }

    /// Drain the shared queue until it closes, applying the current config
    /// and resolver snapshot to each popped id (SPEC_FULL.md §9: reload
    /// publishes a fresh config/resolver rather than mutating in place, so
    /// each tick reads whatever is current at pop time).
    pub async fn run(self, queue: Arc<Mutex<Receiver<i64>>>, config: watch::Receiver<Arc<RuntimeConfig>>) {
        loop {
            let next = {
                let mut q = queue.lock().await;
                q.recv().await
            };
            let Some(file_id) = next else {
                tracing::info!(worker = self.id, "queue closed, worker exiting");
                break;
            };

            let snapshot = config.borrow().clone();
            if let Err(e) = self.process_one(file_id, &snapshot).await {
                tracing::error!(worker = self.id, file_id, error = %e, "worker could not update row, leaving it PROCESSING for recovery");
            }
        }
    }

    /// Process a single claimed row end to end. Returns `Err` only when the
    /// row's own state could not be updated at all (so the caller can log
    /// it); every pipeline failure is instead captured as a `FAILED`
    /// transition with the partial patch obtained before the failure.
    pub async fn process_one(&self, file_id: i64, config: &RuntimeConfig) -> Result<()> {
        self.status.mark_processing(file_id).await?;

        let file = self
            .repo
            .get_by_id(file_id)
            .await?
            .ok_or(LibraryError::NotFound(file_id))?;

        let mut patch = StatusPatch::default();
        match self.run_pipeline(&file, config, &mut patch).await {
            Ok(Outcome::Completed) => self.status.mark_completed(file_id, patch).await,
            Ok(Outcome::NoMatch) => self.status.mark_no_match(file_id, patch).await,
            Ok(Outcome::Conflict(message)) => self.status.mark_conflict(file_id, &message, patch).await,
            Err(e) => self.status.mark_failed(file_id, &e.to_string(), patch).await,
        }
    }

    async fn run_pipeline(
        &self,
        file: &MediaFile,
        config: &RuntimeConfig,
        patch: &mut StatusPatch,
    ) -> Result<Outcome> {
        let resolver = self.resolver.borrow().clone();

        let guess = if config.enable_llm {
            let guess = resolver.guess(&file.original_filename).await?;
            let encoded = serde_json::to_string(&guess)
                .map_err(|e| LibraryError::Internal(format!("encoding llm guess: {e}")))?;
            patch.llm_guess = Some(Some(encoded));
            Some(guess)
        } else {
            None
        };

        let attempted_match = config.enable_tmdb && guess.is_some();
        let record = if attempted_match {
            resolver.identify(guess.as_ref().unwrap()).await?
        } else {
            None
        };

        let Some(record) = record else {
            return Ok(if attempted_match {
                Outcome::NoMatch
            } else {
                Outcome::Completed
            });
        };

        patch.tmdb_id = Some(Some(record.tmdb_id));
        patch.media_type = Some(Some(record.media_type.as_str().to_string()));
        patch.processed_data = Some(Some(record.raw.to_string()));

        let guess = guess.expect("a tmdb match implies stage A produced a guess");
        let destination = planner::plan_destination(
            &record,
            &guess,
            Path::new(&file.original_filepath),
            Path::new(&config.target_dir),
        );

        match linker::link(Path::new(&file.original_filepath), &destination).await {
            LinkResult::Success => {
                patch.new_filepath = Some(Some(destination.to_string_lossy().into_owned()));
                Ok(Outcome::Completed)
            }
            LinkResult::FailedConflict => Ok(Outcome::Conflict(format!(
                "destination already exists: {}",
                destination.display()
            ))),
            other => Err(LibraryError::Internal(format!("link failed: {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, NewMediaFile, Status};
    use crate::resolver::{FilenameGuess, MediaType, ResolvedRecord};
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::tempdir;

    struct FakeResolver {
        guess: FilenameGuess,
        record: Option<ResolvedRecord>,
    }

    fn resolver_channel(resolver: Arc<dyn Resolve>) -> watch::Receiver<Arc<dyn Resolve>> {
        let (_tx, rx) = watch::channel(resolver);
        rx
    }

    #[async_trait]
    impl Resolve for FakeResolver {
        async fn guess(&self, _filename: &str) -> Result<FilenameGuess> {
            Ok(self.guess.clone())
        }

        async fn identify(&self, _guess: &FilenameGuess) -> Result<Option<ResolvedRecord>> {
            Ok(self.record.clone())
        }
    }

    async fn insert_source_file(repo: &Repository, dir: &Path, name: &str) -> crate::db::MediaFile {
        let path = dir.join(name);
        std::fs::write(&path, b"data").unwrap();
        repo.insert(NewMediaFile {
            inode: 1,
            device_id: 1,
            original_filepath: path.to_string_lossy().into_owned(),
            original_filename: name.to_string(),
            file_size: 4,
        })
        .await
        .unwrap()
    }

    fn movie_setup() -> (FilenameGuess, ResolvedRecord) {
        (
            FilenameGuess {
                title: "Dune Part Two".to_string(),
                media_type: MediaType::Movie,
                year: Some(2024),
                season: None,
                episode: None,
            },
            ResolvedRecord {
                tmdb_id: 693134,
                media_type: MediaType::Movie,
                title: "Dune: Part Two".to_string(),
                year: Some(2024),
                raw: json!({"id": 693134}),
            },
        )
    }

    #[tokio::test]
    async fn happy_path_completes_and_links() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src");
        let target = dir.path().join("tgt");
        std::fs::create_dir_all(&source).unwrap();

        let pool = db::connect("sqlite::memory:").await.unwrap();
        let repo = Repository::new(pool);
        let file = insert_source_file(&repo, &source, "Dune.Part.Two.2024.mkv").await;

        let (guess, record) = movie_setup();
        let resolver: Arc<dyn Resolve> = Arc::new(FakeResolver { guess, record: Some(record) });
        let worker = Worker::new(0, repo.clone(), StatusManager::new(repo.clone()), resolver_channel(resolver));

        let config = RuntimeConfig {
            target_dir: target.to_string_lossy().into_owned(),
            ..RuntimeConfig::default()
        };
        worker.process_one(file.id, &config).await.unwrap();

        let reloaded = repo.get_by_id(file.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, Status::Completed);
        let new_path = reloaded.new_filepath.unwrap();
        assert!(new_path.ends_with("Dune Part Two (2024).mkv"));
        assert!(Path::new(&new_path).exists());
    }

    #[tokio::test]
    async fn no_match_sets_status_and_message() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src");
        std::fs::create_dir_all(&source).unwrap();

        let pool = db::connect("sqlite::memory:").await.unwrap();
        let repo = Repository::new(pool);
        let file = insert_source_file(&repo, &source, "unknown.mkv").await;

        let (guess, _) = movie_setup();
        let resolver: Arc<dyn Resolve> = Arc::new(FakeResolver { guess, record: None });
        let worker = Worker::new(0, repo.clone(), StatusManager::new(repo.clone()), resolver_channel(resolver));

        worker.process_one(file.id, &RuntimeConfig::default()).await.unwrap();

        let reloaded = repo.get_by_id(file.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, Status::NoMatch);
        assert_eq!(reloaded.error_message.as_deref(), Some("No TMDB match found"));
    }

    #[tokio::test]
    async fn conflict_preserves_resolved_fields_and_leaves_source_intact() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src");
        let target = dir.path().join("tgt");
        std::fs::create_dir_all(&source).unwrap();

        let pool = db::connect("sqlite::memory:").await.unwrap();
        let repo = Repository::new(pool);
        let file = insert_source_file(&repo, &source, "Dune.Part.Two.2024.mkv").await;

        let dest_dir = target.join("Movies");
        std::fs::create_dir_all(&dest_dir).unwrap();
        std::fs::write(dest_dir.join("Dune Part Two (2024).mkv"), b"already here").unwrap();

        let (guess, record) = movie_setup();
        let resolver: Arc<dyn Resolve> = Arc::new(FakeResolver { guess, record: Some(record) });
        let worker = Worker::new(0, repo.clone(), StatusManager::new(repo.clone()), resolver_channel(resolver));

        let config = RuntimeConfig {
            target_dir: target.to_string_lossy().into_owned(),
            ..RuntimeConfig::default()
        };
        worker.process_one(file.id, &config).await.unwrap();

        let reloaded = repo.get_by_id(file.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, Status::Conflict);
        assert!(reloaded.new_filepath.is_none());
        assert!(reloaded.tmdb_id.is_some());
    }

    #[tokio::test]
    async fn tmdb_disabled_completes_with_guess_only() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src");
        std::fs::create_dir_all(&source).unwrap();

        let pool = db::connect("sqlite::memory:").await.unwrap();
        let repo = Repository::new(pool);
        let file = insert_source_file(&repo, &source, "Dune.Part.Two.2024.mkv").await;

        let (guess, record) = movie_setup();
        let resolver: Arc<dyn Resolve> = Arc::new(FakeResolver { guess, record: Some(record) });
        let worker = Worker::new(0, repo.clone(), StatusManager::new(repo.clone()), resolver_channel(resolver));

        let config = RuntimeConfig {
            enable_tmdb: false,
            ..RuntimeConfig::default()
        };
        worker.process_one(file.id, &config).await.unwrap();

        let reloaded = repo.get_by_id(file.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, Status::Completed);
        assert!(reloaded.new_filepath.is_none());
        assert!(reloaded.llm_guess.is_some());
    }
}
