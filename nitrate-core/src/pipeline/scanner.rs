//! The Scanner (C5): periodically walks `SOURCE_DIR`, filters candidates,
//! and inserts newly discovered files at `PENDING`.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::RuntimeConfig;
use crate::db::{NewMediaFile, Repository};
use crate::error::{LibraryError, Result};

pub struct Scanner {
    repo: Repository,
}

impl Scanner {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Run one scan tick, returning the number of newly inserted rows.
    /// Per-file errors are logged and skipped; only a panic in the walk
    /// itself aborts the tick (SPEC_FULL.md §4.5).
    pub async fn tick(&self, config: &RuntimeConfig) -> Result<usize> {
        let source = PathBuf::from(&config.source_dir);
        let target = PathBuf::from(&config.target_dir);
        let extensions = config.video_extensions.clone();
        let min_bytes = config.min_file_size_mb.saturating_mul(1024 * 1024);
        let exclude_target = config.scan_exclude_target_dir;
        let follow_symlinks = config.scan_follow_symlinks;

        let candidates = tokio::task::spawn_blocking(move || {
            walk(&source, &target, exclude_target, follow_symlinks, &extensions, min_bytes)
        })
        .await
        .map_err(|e| LibraryError::Internal(format!("scanner walk task panicked: {e}")))?;

        let mut inserted = 0usize;
        for candidate in candidates {
            match self
                .repo
                .get_by_inode_device(candidate.inode, candidate.device_id)
                .await
            {
                Ok(Some(_)) => continue,
                Ok(None) => match self.repo.insert(candidate).await {
                    Ok(_) => inserted += 1,
                    Err(e) => tracing::warn!(error = %e, "scanner insert failed, skipping"),
                },
                Err(e) => tracing::warn!(error = %e, "scanner lookup failed, skipping"),
            }
        }
        Ok(inserted)
    }
}

fn walk(
    source: &Path,
    target: &Path,
    exclude_target: bool,
    follow_symlinks: bool,
    extensions: &[String],
    min_bytes: u64,
) -> Vec<NewMediaFile> {
    let target_resolved = target.canonicalize().ok();
    let mut out = Vec::new();

    let walker = WalkDir::new(source)
        .follow_links(follow_symlinks)
        .into_iter()
        .filter_entry(|entry| {
            if !exclude_target || !entry.file_type().is_dir() {
                return true;
            }
            match (entry.path().canonicalize(), &target_resolved) {
                (Ok(resolved), Some(target_resolved)) => {
                    resolved != *target_resolved && !resolved.starts_with(target_resolved)
                }
                _ => true,
            }
        });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "scan walk entry error, skipping");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let matches_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .is_some_and(|e| extensions.contains(&e));
        if !matches_extension {
            continue;
        }

        let meta = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "stat failed, skipping");
                continue;
            }
        };
        if meta.len() < min_bytes {
            continue;
        }

        let (inode, device_id) = file_identity(&meta);

        out.push(NewMediaFile {
            inode,
            device_id,
            original_filepath: path.to_string_lossy().into_owned(),
            original_filename: path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string(),
            file_size: meta.len() as i64,
        });
    }
    out
}

#[cfg(unix)]
fn file_identity(meta: &std::fs::Metadata) -> (i64, i64) {
    use std::os::unix::fs::MetadataExt;
    (meta.ino() as i64, meta.dev() as i64)
}

#[cfg(not(unix))]
fn file_identity(_meta: &std::fs::Metadata) -> (i64, i64) {
    (0, 0)
}
