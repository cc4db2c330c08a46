use sqlx::SqlitePool;
use std::collections::HashMap;

use super::media_file::{MediaFileRow, NewMediaFile, StatusPatch};
use super::{MediaFile, MediaFilter, MediaSort, Status};
use crate::error::Result;

const MEDIA_FILE_COLUMNS: &str = "id, inode, device_id, original_filepath, original_filename, \
    file_size, status, llm_guess, tmdb_id, media_type, processed_data, new_filepath, \
    error_message, retry_count, created_at, updated_at";

/// The C1 State Store: every other component reaches the database through
/// this type. Backed by SQLite, whose single-writer model doubles as the
/// mutex the claim primitive needs (SPEC_FULL.md §9).
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

pub struct ListPage {
    pub items: Vec<MediaFile>,
    pub total: i64,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn insert(&self, file: NewMediaFile) -> Result<MediaFile> {
        let row = sqlx::query_as::<_, MediaFileRow>(&format!(
            "INSERT INTO media_files
                (inode, device_id, original_filepath, original_filename, file_size, status)
             VALUES (?, ?, ?, ?, ?, 'PENDING')
             RETURNING {MEDIA_FILE_COLUMNS}"
        ))
        .bind(file.inode)
        .bind(file.device_id)
        .bind(&file.original_filepath)
        .bind(&file.original_filename)
        .bind(file.file_size)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<MediaFile>> {
        let row = sqlx::query_as::<_, MediaFileRow>(&format!(
            "SELECT {MEDIA_FILE_COLUMNS} FROM media_files WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    pub async fn get_by_inode_device(
        &self,
        inode: i64,
        device_id: i64,
    ) -> Result<Option<MediaFile>> {
        let row = sqlx::query_as::<_, MediaFileRow>(&format!(
            "SELECT {MEDIA_FILE_COLUMNS} FROM media_files WHERE inode = ? AND device_id = ?"
        ))
        .bind(inode)
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    fn build_where(filter: &MediaFilter, args: &mut Vec<String>) -> String {
        let mut clauses = Vec::new();

        if !filter.statuses.is_empty() {
            let placeholders = filter
                .statuses
                .iter()
                .map(|_| "?")
                .collect::<Vec<_>>()
                .join(", ");
            clauses.push(format!("status IN ({placeholders})"));
            for status in &filter.statuses {
                args.push(status.as_str().to_string());
            }
        }

        for token in &filter.search_tokens {
            clauses.push(
                "(lower(original_filename) LIKE ? ESCAPE '\\' OR \
                  lower(original_filepath) LIKE ? ESCAPE '\\')"
                    .to_string(),
            );
            let pattern = format!("%{}%", like_escape(&token.to_lowercase()));
            args.push(pattern.clone());
            args.push(pattern);
        }

        if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        }
    }

    pub async fn count(&self, filter: &MediaFilter) -> Result<i64> {
        let mut args = Vec::new();
        let where_clause = Self::build_where(filter, &mut args);
        let sql = format!("SELECT COUNT(*) FROM media_files {where_clause}");

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for arg in &args {
            query = query.bind(arg);
        }

        Ok(query.fetch_one(&self.pool).await?)
    }

    pub async fn list(
        &self,
        filter: &MediaFilter,
        sort: MediaSort,
        skip: i64,
        limit: i64,
    ) -> Result<ListPage> {
        let total = self.count(filter).await?;

        let mut args = Vec::new();
        let where_clause = Self::build_where(filter, &mut args);
        let sql = format!(
            "SELECT {MEDIA_FILE_COLUMNS} FROM media_files {where_clause} \
             ORDER BY {} {} LIMIT ? OFFSET ?",
            sort.field.column(),
            sort.direction.as_sql(),
        );

        let mut query = sqlx::query_as::<_, MediaFileRow>(&sql);
        for arg in &args {
            query = query.bind(arg);
        }
        query = query.bind(limit).bind(skip);

        let rows = query.fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>>>()?;

        Ok(ListPage { items, total })
    }

    /// Distinct filenames with a case-insensitive prefix match, for the
    /// `/api/files/suggest` endpoint.
    pub async fn distinct_filenames(&self, prefix: &str, limit: i64) -> Result<Vec<String>> {
        if prefix.trim().is_empty() {
            return Ok(Vec::new());
        }

        let pattern = format!("{}%", like_escape(&prefix.to_lowercase()));
        let names = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT original_filename FROM media_files \
             WHERE lower(original_filename) LIKE ? ESCAPE '\\' \
             ORDER BY original_filename LIMIT ?",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    pub async fn group_by_status(&self) -> Result<HashMap<Status, i64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM media_files GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(status, count)| Ok((status.parse::<Status>()?, count)))
            .collect()
    }

    /// The C1 claim primitive: atomically move up to `batch_size` `PENDING`
    /// rows to `QUEUED` and return their ids, ordered oldest-first.
    ///
    /// `BEGIN IMMEDIATE` grabs SQLite's single writer lock for the whole
    /// transaction, so two concurrent callers can never observe or claim the
    /// same row (SPEC_FULL.md §4.1, §9).
    pub async fn claim_pending(&self, batch_size: i64) -> Result<Vec<i64>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&mut *tx)
            .await?;

        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM media_files WHERE status = 'PENDING' ORDER BY id LIMIT ?",
        )
        .bind(batch_size)
        .fetch_all(&mut *tx)
        .await?;

        if !ids.is_empty() {
            let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let sql = format!(
                "UPDATE media_files SET status = 'QUEUED', updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE id IN ({placeholders})"
            );
            let mut query = sqlx::query(&sql);
            for id in &ids {
                query = query.bind(id);
            }
            query.execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(ids)
    }

    /// Crash recovery (SPEC_FULL.md §5, L3): any row left `QUEUED` or
    /// `PROCESSING` from a previous run is stale, because the in-memory
    /// queue that would resume it is gone. Reset to `PENDING`.
    pub async fn reset_stale(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE media_files SET status = 'PENDING', \
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
             WHERE status IN ('QUEUED', 'PROCESSING')",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// The C8 Status Manager's single write path. Loads the row, applies the
    /// whitelisted patch fields, sets status/error, and commits atomically.
    /// A missing row logs (by the caller) and returns `Ok(None)` rather than
    /// raising, per SPEC_FULL.md §4.8.
    pub async fn update_status(
        &self,
        id: i64,
        new_status: Status,
        error_message: Option<&str>,
        patch: &StatusPatch,
    ) -> Result<Option<MediaFile>> {
        if self.get_by_id(id).await?.is_none() {
            return Ok(None);
        }

        let mut sets = vec![
            "status = ?".to_string(),
            "error_message = ?".to_string(),
            "updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')".to_string(),
        ];

        macro_rules! push_patch {
            ($field:ident) => {
                if patch.$field.is_some() {
                    sets.push(concat!(stringify!($field), " = ?").to_string());
                }
            };
        }
        push_patch!(llm_guess);
        push_patch!(tmdb_id);
        push_patch!(media_type);
        push_patch!(processed_data);
        push_patch!(new_filepath);

        let sql = format!(
            "UPDATE media_files SET {} WHERE id = ? RETURNING {MEDIA_FILE_COLUMNS}",
            sets.join(", ")
        );

        let mut query = sqlx::query_as::<_, MediaFileRow>(&sql)
            .bind(new_status.as_str())
            .bind(error_message);

        if let Some(v) = &patch.llm_guess {
            query = query.bind(v.clone());
        }
        if let Some(v) = &patch.tmdb_id {
            query = query.bind(*v);
        }
        if let Some(v) = &patch.media_type {
            query = query.bind(v.clone());
        }
        if let Some(v) = &patch.processed_data {
            query = query.bind(v.clone());
        }
        if let Some(v) = &patch.new_filepath {
            query = query.bind(v.clone());
        }

        let row = query.bind(id).fetch_one(&self.pool).await?;
        Ok(Some(row.try_into()?))
    }

    /// Control API retry: terminal -> PENDING, only from a failure terminal
    /// (SPEC_FULL.md §4.7, §4.10). Returns the previous status on success so
    /// the caller can report `{previous_status, current_status}`.
    pub async fn retry(&self, id: i64) -> Result<RetryOutcome> {
        let Some(file) = self.get_by_id(id).await? else {
            return Ok(RetryOutcome::NotFound);
        };

        if !file.status.is_retryable() {
            return Ok(RetryOutcome::NotRetryable(file.status));
        }

        sqlx::query(
            "UPDATE media_files SET status = 'PENDING', error_message = NULL, \
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(RetryOutcome::Retried {
            previous_status: file.status,
        })
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media_files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub enum RetryOutcome {
    NotFound,
    NotRetryable(Status),
    Retried { previous_status: Status },
}

fn like_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::error::LibraryError;

    async fn test_repo() -> Repository {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        Repository::new(pool)
    }

    fn sample(path: &str, inode: i64) -> NewMediaFile {
        NewMediaFile {
            inode,
            device_id: 1,
            original_filepath: path.to_string(),
            original_filename: path.rsplit('/').next().unwrap().to_string(),
            file_size: 1024,
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let repo = test_repo().await;
        let created = repo.insert(sample("/src/a.mkv", 1)).await.unwrap();
        assert_eq!(created.status, Status::Pending);

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.original_filepath, "/src/a.mkv");
    }

    #[tokio::test]
    async fn duplicate_inode_device_is_rejected() {
        let repo = test_repo().await;
        repo.insert(sample("/src/a.mkv", 42)).await.unwrap();
        let err = repo.insert(sample("/src/b.mkv", 42)).await.unwrap_err();
        assert!(matches!(err, LibraryError::Database(_)));
    }

    #[tokio::test]
    async fn claim_pending_is_exactly_once_across_concurrent_batches() {
        let repo = test_repo().await;
        for i in 0..10 {
            repo.insert(sample(&format!("/src/{i}.mkv"), i)).await.unwrap();
        }

        let (a, b) = tokio::join!(repo.claim_pending(6), repo.claim_pending(6));
        let a = a.unwrap();
        let b = b.unwrap();

        let mut all: Vec<i64> = a.iter().chain(b.iter()).copied().collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), a.len() + b.len(), "no id claimed twice");
        assert_eq!(a.len() + b.len(), 10);

        let remaining = repo.count(&MediaFilter {
            statuses: vec![Status::Pending],
            ..Default::default()
        }).await.unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn reset_stale_recovers_queued_and_processing() {
        let repo = test_repo().await;
        let f1 = repo.insert(sample("/src/a.mkv", 1)).await.unwrap();
        let f2 = repo.insert(sample("/src/b.mkv", 2)).await.unwrap();
        repo.claim_pending(10).await.unwrap(); // both -> QUEUED
        repo.update_status(f2.id, Status::Processing, None, &StatusPatch::default())
            .await
            .unwrap();

        let affected = repo.reset_stale().await.unwrap();
        assert_eq!(affected, 2);

        assert_eq!(
            repo.get_by_id(f1.id).await.unwrap().unwrap().status,
            Status::Pending
        );
        assert_eq!(
            repo.get_by_id(f2.id).await.unwrap().unwrap().status,
            Status::Pending
        );
    }

    #[tokio::test]
    async fn retry_only_allowed_from_failure_terminals() {
        let repo = test_repo().await;
        let file = repo.insert(sample("/src/a.mkv", 1)).await.unwrap();

        match repo.retry(file.id).await.unwrap() {
            RetryOutcome::NotRetryable(Status::Pending) => {}
            _ => panic!("expected NotRetryable(Pending)"),
        }

        repo.update_status(file.id, Status::Failed, Some("boom"), &StatusPatch::default())
            .await
            .unwrap();

        match repo.retry(file.id).await.unwrap() {
            RetryOutcome::Retried { previous_status: Status::Failed } => {}
            _ => panic!("expected Retried"),
        }

        let reloaded = repo.get_by_id(file.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, Status::Pending);
        assert!(reloaded.error_message.is_none());
    }

    #[tokio::test]
    async fn suggest_matches_case_insensitive_prefix() {
        let repo = test_repo().await;
        repo.insert(sample("/src/Breaking.Bad.S01E01.mkv", 1)).await.unwrap();
        repo.insert(sample("/src/other.mkv", 2)).await.unwrap();

        let names = repo.distinct_filenames("breaking", 10).await.unwrap();
        assert_eq!(names, vec!["Breaking.Bad.S01E01.mkv"]);

        assert!(repo.distinct_filenames("  ", 10).await.unwrap().is_empty());
    }
}
