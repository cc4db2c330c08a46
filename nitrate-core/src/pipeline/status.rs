//! The Status Manager (C8): the single write path for `status` and its
//! associated fields. Every other component mutates a row only by calling
//! through here (SPEC_FULL.md I3).

use crate::db::{Repository, Status, StatusPatch};
use crate::error::Result;

#[derive(Clone)]
pub struct StatusManager {
    repo: Repository,
}

impl StatusManager {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn transition(
        &self,
        id: i64,
        new_status: Status,
        error_message: Option<&str>,
        patch: StatusPatch,
    ) -> Result<()> {
        match self
            .repo
            .update_status(id, new_status, error_message, &patch)
            .await?
        {
            Some(_) => {
                tracing::info!(file_id = id, status = %new_status, "status transition");
                Ok(())
            }
            None => {
                tracing::warn!(file_id = id, "status transition skipped, row not found");
                Ok(())
            }
        }
    }

    pub async fn mark_processing(&self, id: i64) -> Result<()> {
        self.transition(id, Status::Processing, None, StatusPatch::default())
            .await
    }

    pub async fn mark_completed(&self, id: i64, patch: StatusPatch) -> Result<()> {
        self.transition(id, Status::Completed, None, patch).await
    }

    pub async fn mark_failed(&self, id: i64, message: &str, patch: StatusPatch) -> Result<()> {
        self.transition(id, Status::Failed, Some(message), patch).await
    }

    pub async fn mark_conflict(&self, id: i64, message: &str, patch: StatusPatch) -> Result<()> {
        self.transition(id, Status::Conflict, Some(message), patch)
            .await
    }

    pub async fn mark_no_match(&self, id: i64, patch: StatusPatch) -> Result<()> {
        self.transition(id, Status::NoMatch, Some("No TMDB match found"), patch)
            .await
    }
}
