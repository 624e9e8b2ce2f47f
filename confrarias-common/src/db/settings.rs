//! Settings database operations
//!
//! Key-value accessors over the `settings` table. An empty stored value is
//! reported as unset.

use crate::error::{Error, Result};
use sqlx::SqlitePool;

/// Mapbox key used by the address autocomplete on discovery forms
pub const MAPBOX_API_KEY: &str = "mapbox_api_key";

pub async fn get_mapbox_api_key(db: &SqlitePool) -> Result<Option<String>> {
    get_setting::<String>(db, MAPBOX_API_KEY).await
}

pub async fn set_mapbox_api_key(db: &SqlitePool, key: &str) -> Result<()> {
    set_setting(db, MAPBOX_API_KEY, key.trim()).await
}

/// Generic setting getter
pub async fn get_setting<T>(db: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match row.and_then(|(value,)| value).filter(|v| !v.is_empty()) {
        Some(value) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T>(db: &SqlitePool, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    #[tokio::test]
    async fn test_mapbox_key_unset_by_default() {
        let pool = init_memory_database().await.unwrap();
        assert_eq!(get_mapbox_api_key(&pool).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_overwrite_mapbox_key() {
        let pool = init_memory_database().await.unwrap();

        set_mapbox_api_key(&pool, " pk.first ").await.unwrap();
        assert_eq!(get_mapbox_api_key(&pool).await.unwrap(), Some("pk.first".to_string()));

        set_mapbox_api_key(&pool, "pk.second").await.unwrap();
        assert_eq!(get_mapbox_api_key(&pool).await.unwrap(), Some("pk.second".to_string()));
    }

    #[tokio::test]
    async fn test_unparseable_setting_is_config_error() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, "page_size", "lots").await.unwrap();

        let result = get_setting::<i64>(&pool, "page_size").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
