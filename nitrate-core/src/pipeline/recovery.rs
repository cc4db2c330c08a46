//! Crash recovery (SPEC_FULL.md §5, I4, L3): rows left `QUEUED` or
//! `PROCESSING` from a previous run are stale because the in-memory queue
//! that would have resumed them is gone.

use crate::db::Repository;
use crate::error::Result;

pub async fn recover(repo: &Repository) -> Result<u64> {
    let reset = repo.reset_stale().await?;
    if reset > 0 {
        tracing::info!(reset, "recovered stale QUEUED/PROCESSING rows to PENDING");
    }
    Ok(reset)
}
