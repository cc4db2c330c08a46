//! State store (C1): the `media_files` / `config_items` tables and the
//! repository that every other component writes through.

pub mod config_item;
mod media_file;
mod repository;

pub use media_file::{
    MediaFile, MediaFilter, MediaSort, NewMediaFile, SortDirection, SortField, Status,
    StatusPatch,
};
pub use repository::{ListPage, Repository, RetryOutcome};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::error::Result;

/// Open (creating if necessary) the sqlite database at `database_url` and
/// run pending migrations. `database_url` is the dotted-sqlite form, e.g.
/// `sqlite:///var/lib/nitrate/library.db` or `sqlite::memory:`.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // SQLite only has one writer; a single-connection pool turns that
    // constraint into an explicit serialization point instead of a source
    // of "database is locked" errors under concurrent writers.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
