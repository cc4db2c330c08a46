//! The Linker (C2): hardlink `src` to `dst`, classified into a closed
//! result set. Never leaves a partial file behind on failure.

use std::path::Path;

/// Closed outcome set for a link attempt (SPEC_FULL.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkResult {
    Success,
    FailedConflict,
    FailedCrossDevice,
    FailedNoSource,
    FailedUnknown,
}

/// Attempt to hardlink `src` to `dst`.
///
/// Preconditions are checked in a fixed order: source must
/// exist and be a regular file, destination must not already exist, parent
/// directories are created (tolerating a race where another task just
/// created them), then the hardlink syscall runs. Blocking filesystem calls
/// are dispatched to a blocking thread so the caller's async task never
/// stalls on them.
pub async fn link(src: &Path, dst: &Path) -> LinkResult {
    let src = src.to_path_buf();
    let dst = dst.to_path_buf();

    tokio::task::spawn_blocking(move || link_blocking(&src, &dst))
        .await
        .unwrap_or(LinkResult::FailedUnknown)
}

fn link_blocking(src: &Path, dst: &Path) -> LinkResult {
    match std::fs::symlink_metadata(src) {
        Ok(meta) if meta.is_file() => {}
        _ => return LinkResult::FailedNoSource,
    }

    if dst.exists() {
        return LinkResult::FailedConflict;
    }

    if let Some(parent) = dst.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            if e.kind() != std::io::ErrorKind::AlreadyExists {
                return LinkResult::FailedUnknown;
            }
        }
    }

    match std::fs::hard_link(src, dst) {
        Ok(()) => LinkResult::Success,
        Err(e) => classify_link_error(&e),
    }
}

fn classify_link_error(err: &std::io::Error) -> LinkResult {
    // AlreadyExists can surface here instead of the pre-check above under a
    // race with another process/task creating the same destination.
    if err.kind() == std::io::ErrorKind::AlreadyExists {
        return LinkResult::FailedConflict;
    }

    #[cfg(unix)]
    {
        use std::io::ErrorKind;
        // io::Error doesn't expose EXDEV as a stable ErrorKind; fall back to
        // the raw errno. 18 is EXDEV on Linux, macOS, and BSD.
        if err.raw_os_error() == Some(18) {
            return LinkResult::FailedCrossDevice;
        }
        if err.kind() == ErrorKind::PermissionDenied {
            return LinkResult::FailedUnknown;
        }
    }

    LinkResult::FailedUnknown
}
