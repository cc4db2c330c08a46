//! The Producer (C6): claims a bounded batch of `PENDING` rows and pushes
//! their ids onto the in-memory work queue.

use tokio::sync::mpsc::Sender;

use crate::db::Repository;
use crate::error::Result;

pub struct Producer {
    repo: Repository,
    queue: Sender<i64>,
}

impl Producer {
    pub fn new(repo: Repository, queue: Sender<i64>) -> Self {
        Self { repo, queue }
    }

    /// Claim up to `batch_size` rows and enqueue them, returning the number
    /// actually dispatched. The Producer never hands rows to the queue
    /// without first durably flipping them to `QUEUED` (SPEC_FULL.md §4.6).
    pub async fn tick(&self, batch_size: i64) -> Result<usize> {
        let ids = self.repo.claim_pending(batch_size).await?;
        let mut sent = 0usize;
        for id in ids {
            if self.queue.send(id).await.is_err() {
                tracing::warn!(file_id = id, "producer queue closed, stopping dispatch for this tick");
                break;
            }
            sent += 1;
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn claims_and_enqueues_pending_rows() {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        let repo = Repository::new(pool);
        for i in 0..3 {
            repo.insert(crate::db::NewMediaFile {
                inode: i,
                device_id: 1,
                original_filepath: format!("/src/{i}.mkv"),
                original_filename: format!("{i}.mkv"),
                file_size: 100,
            })
            .await
            .unwrap();
        }

        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let producer = Producer::new(repo, tx);
        let sent = producer.tick(10).await.unwrap();
        assert_eq!(sent, 3);

        let mut received = Vec::new();
        while let Ok(id) = rx.try_recv() {
            received.push(id);
        }
        assert_eq!(received.len(), 3);
    }

    #[tokio::test]
    async fn tick_with_nothing_pending_is_a_no_op() {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        let repo = Repository::new(pool);
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        let producer = Producer::new(repo, tx);
        assert_eq!(producer.tick(10).await.unwrap(), 0);
    }
}
