use sqlx::SqlitePool;

use crate::error::Result;

/// A single `config_items` row: a key, its JSON-encoded value, and metadata.
/// Backs the DB layer of the config subsystem's source priority chain
/// (SPEC_FULL.md §4.9).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConfigItemRow {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<ConfigItemRow>> {
    let row = sqlx::query_as::<_, ConfigItemRow>(
        "SELECT key, value, description FROM config_items WHERE key = ?",
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<ConfigItemRow>> {
    let rows = sqlx::query_as::<_, ConfigItemRow>(
        "SELECT key, value, description FROM config_items ORDER BY key",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Upsert a key; used by the config API's accepted-write path.
pub async fn set(
    pool: &SqlitePool,
    key: &str,
    value_json: &str,
    description: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO config_items (key, value, description, updated_at)
         VALUES (?, ?, ?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            description = COALESCE(excluded.description, config_items.description),
            updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value_json)
    .bind(description)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM config_items WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

/// Startup cleanup pass: drop any stored key that is no longer part of the
/// recognized schema (SPEC_FULL.md §4.9).
pub async fn delete_keys_not_in(pool: &SqlitePool, valid_keys: &[&str]) -> Result<u64> {
    let existing = list_all(pool).await?;
    let mut removed = 0u64;
    for row in existing {
        if !valid_keys.contains(&row.key.as_str()) {
            delete(pool, &row.key).await?;
            removed += 1;
        }
    }
    Ok(removed)
}
