use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LibraryError;

/// Element of the state machine in SPEC_FULL.md §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Conflict,
    NoMatch,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::Pending,
        Status::Queued,
        Status::Processing,
        Status::Completed,
        Status::Failed,
        Status::Conflict,
        Status::NoMatch,
    ];

    /// Terminal states a row can retry *from* (SPEC_FULL.md §4.7).
    pub fn is_retryable(self) -> bool {
        matches!(self, Status::Failed | Status::Conflict | Status::NoMatch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Queued => "QUEUED",
            Status::Processing => "PROCESSING",
            Status::Completed => "COMPLETED",
            Status::Failed => "FAILED",
            Status::Conflict => "CONFLICT",
            Status::NoMatch => "NO_MATCH",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Status::Pending),
            "QUEUED" => Ok(Status::Queued),
            "PROCESSING" => Ok(Status::Processing),
            "COMPLETED" => Ok(Status::Completed),
            "FAILED" => Ok(Status::Failed),
            "CONFLICT" => Ok(Status::Conflict),
            "NO_MATCH" => Ok(Status::NoMatch),
            other => Err(LibraryError::Internal(format!("unknown status '{other}'"))),
        }
    }
}

/// Raw shape of a `media_files` row as sqlx decodes it. Kept separate from
/// [`MediaFile`] so the typed `Status`/`DateTime` conversion lives in one
/// fallible `TryFrom`, rather than hand-writing `sqlx::Decode` for `Status`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct MediaFileRow {
    pub id: i64,
    pub inode: i64,
    pub device_id: i64,
    pub original_filepath: String,
    pub original_filename: String,
    pub file_size: i64,
    pub status: String,
    pub llm_guess: Option<String>,
    pub tmdb_id: Option<i64>,
    pub media_type: Option<String>,
    pub processed_data: Option<String>,
    pub new_filepath: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

fn parse_timestamp(raw: &str) -> crate::error::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LibraryError::Internal(format!("bad timestamp '{raw}': {e}")))
}

impl TryFrom<MediaFileRow> for MediaFile {
    type Error = LibraryError;

    fn try_from(row: MediaFileRow) -> Result<Self, Self::Error> {
        Ok(MediaFile {
            id: row.id,
            inode: row.inode,
            device_id: row.device_id,
            original_filepath: row.original_filepath,
            original_filename: row.original_filename,
            file_size: row.file_size,
            status: row.status.parse()?,
            llm_guess: row.llm_guess,
            tmdb_id: row.tmdb_id,
            media_type: row.media_type,
            processed_data: row.processed_data,
            new_filepath: row.new_filepath,
            error_message: row.error_message,
            retry_count: row.retry_count,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// One row of the `media_files` table — the unit of work for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: i64,
    pub inode: i64,
    pub device_id: i64,
    pub original_filepath: String,
    pub original_filename: String,
    pub file_size: i64,
    pub status: Status,
    pub llm_guess: Option<String>,
    pub tmdb_id: Option<i64>,
    pub media_type: Option<String>,
    pub processed_data: Option<String>,
    pub new_filepath: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A freshly discovered file, not yet assigned an id (Scanner's insert shape).
#[derive(Debug, Clone)]
pub struct NewMediaFile {
    pub inode: i64,
    pub device_id: i64,
    pub original_filepath: String,
    pub original_filename: String,
    pub file_size: i64,
}

/// Fields the Status Manager is allowed to write (SPEC_FULL.md I3).
#[derive(Debug, Clone, Default)]
pub struct StatusPatch {
    pub llm_guess: Option<Option<String>>,
    pub tmdb_id: Option<Option<i64>>,
    pub media_type: Option<Option<String>>,
    pub processed_data: Option<Option<String>>,
    pub new_filepath: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct MediaFilter {
    pub statuses: Vec<Status>,
    pub search_tokens: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    OriginalFilename,
    Status,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::OriginalFilename => "original_filename",
            SortField::Status => "status",
        }
    }
}

impl FromStr for SortField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            "original_filename" => Ok(SortField::OriginalFilename),
            "status" => Ok(SortField::Status),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MediaSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for MediaSort {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl MediaSort {
    /// Parse the `field:direction` wire form (SPEC_FULL.md §4.10).
    pub fn parse(raw: &str) -> Option<Self> {
        let (field, dir) = raw.split_once(':')?;
        Some(Self {
            field: field.parse().ok()?,
            direction: dir.parse().ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
    }

    #[test]
    fn only_failure_terminals_are_retryable() {
        assert!(Status::Failed.is_retryable());
        assert!(Status::Conflict.is_retryable());
        assert!(Status::NoMatch.is_retryable());
        assert!(!Status::Completed.is_retryable());
        assert!(!Status::Pending.is_retryable());
        assert!(!Status::Queued.is_retryable());
        assert!(!Status::Processing.is_retryable());
    }

    #[test]
    fn sort_parses_field_and_direction() {
        let sort = MediaSort::parse("updated_at:asc").unwrap();
        assert_eq!(sort.field, SortField::UpdatedAt);
        assert_eq!(sort.direction, SortDirection::Asc);
        assert!(MediaSort::parse("bogus").is_none());
        assert!(MediaSort::parse("updated_at:sideways").is_none());
    }
}
