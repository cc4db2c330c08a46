//! End-to-end pipeline tests wiring Scanner -> Producer -> Worker -> Status
//! Manager together, covering SPEC_FULL.md §8 scenarios 1 and 6 at a level
//! no single module's unit tests reach.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use nitrate_core::config::RuntimeConfig;
use nitrate_core::db::{self, NewMediaFile, Repository, Status, StatusPatch};
use nitrate_core::pipeline::{Producer, Scanner, StatusManager, Worker};
use nitrate_core::resolver::{FilenameGuess, MediaType, Resolve, ResolvedRecord};
use nitrate_core::error::Result;

struct FakeResolver;

#[async_trait]
impl Resolve for FakeResolver {
    async fn guess(&self, filename: &str) -> Result<FilenameGuess> {
        Ok(FilenameGuess {
            title: filename.trim_end_matches(".mkv").replace('.', " "),
            media_type: MediaType::Movie,
            year: Some(2024),
            season: None,
            episode: None,
        })
    }

    async fn identify(&self, guess: &FilenameGuess) -> Result<Option<ResolvedRecord>> {
        Ok(Some(ResolvedRecord {
            tmdb_id: 1,
            media_type: MediaType::Movie,
            title: guess.title.clone(),
            year: guess.year,
            raw: json!({"id": 1}),
        }))
    }
}

#[tokio::test]
async fn scan_claim_and_process_reaches_completed() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("src");
    let target = dir.path().join("tgt");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("Dune.Part.Two.2024.mkv"), vec![0u8; 1024]).unwrap();

    let pool = db::connect("sqlite::memory:").await.unwrap();
    let repo = Repository::new(pool);

    let config = RuntimeConfig {
        source_dir: source.to_string_lossy().into_owned(),
        target_dir: target.to_string_lossy().into_owned(),
        min_file_size_mb: 0,
        ..RuntimeConfig::default()
    };

    let scanner = Scanner::new(repo.clone());
    let discovered = scanner.tick(&config).await.unwrap();
    assert_eq!(discovered, 1);

    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    let producer = Producer::new(repo.clone(), tx);
    let claimed = producer.tick(10).await.unwrap();
    assert_eq!(claimed, 1);

    let file_id = rx.recv().await.unwrap();

    let resolver: Arc<dyn Resolve> = Arc::new(FakeResolver);
    let (_resolver_tx, resolver_rx) = tokio::sync::watch::channel(resolver);
    let worker = Worker::new(0, repo.clone(), StatusManager::new(repo.clone()), resolver_rx);
    worker.process_one(file_id, &config).await.unwrap();

    let file = repo.get_by_id(file_id).await.unwrap().unwrap();
    assert_eq!(file.status, Status::Completed);
    let new_path = file.new_filepath.unwrap();
    assert!(Path::new(&new_path).exists());
}

/// SPEC_FULL.md §8 scenario 6: a row left PROCESSING by a simulated crash
/// is reset to PENDING before any new work happens.
#[tokio::test]
async fn crash_recovery_resets_processing_rows() {
    let pool = db::connect("sqlite::memory:").await.unwrap();
    let repo = Repository::new(pool);

    let file = repo
        .insert(NewMediaFile {
            inode: 1,
            device_id: 1,
            original_filepath: "/src/a.mkv".to_string(),
            original_filename: "a.mkv".to_string(),
            file_size: 1024,
        })
        .await
        .unwrap();
    repo.update_status(file.id, Status::Processing, None, &StatusPatch::default())
        .await
        .unwrap();

    nitrate_core::pipeline::recover(&repo).await.unwrap();

    let reloaded = repo.get_by_id(file.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, Status::Pending);
}
