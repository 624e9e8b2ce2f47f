//! Database schema migrations
//!
//! Versioned, idempotent upgrades applied after the `CREATE TABLE IF NOT
//! EXISTS` pass, tracked in `schema_version`.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field depend on them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Check before altering** - every step must be safe to re-run

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database (0 if none recorded)
async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

async fn has_column(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await?;

    Ok(count > 0)
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: link approved submissions to their discovery
///
/// Databases created before `resolved_discovery_id` existed could only find
/// the published discovery by title. Adds the column and backfills it for
/// approved submissions whose title matches exactly one discovery; ambiguous
/// titles stay unlinked.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: add resolved_discovery_id to submissions");

    if !has_column(pool, "submissions", "resolved_discovery_id").await? {
        sqlx::query(
            "ALTER TABLE submissions ADD COLUMN resolved_discovery_id INTEGER \
             REFERENCES discoveries(id) ON DELETE SET NULL",
        )
        .execute(pool)
        .await?;
        info!("  ✓ Added resolved_discovery_id column");
    }

    let linked = sqlx::query(
        r#"
        UPDATE submissions
        SET resolved_discovery_id = (
            SELECT d.id FROM discoveries d WHERE d.title = submissions.discovery_title
        )
        WHERE status = 'Aprovado'
          AND resolved_discovery_id IS NULL
          AND (SELECT COUNT(*) FROM discoveries d
               WHERE d.title = submissions.discovery_title) = 1
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    if linked > 0 {
        info!("  ✓ Linked {} approved submission(s) by title", linked);
    }

    Ok(())
}

/// Migration v2: one membership row per (user, confraria)
///
/// Older databases had no uniqueness on membership requests. Keeps the most
/// advanced row of each duplicate group (approved before pending, then the
/// oldest) and adds the unique index.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: unique membership per user and confraria");

    let removed = sqlx::query(
        r#"
        DELETE FROM confraria_members
        WHERE id NOT IN (
            SELECT (
                SELECT m2.id FROM confraria_members m2
                WHERE m2.user_id = m1.user_id AND m2.confraria_id = m1.confraria_id
                ORDER BY CASE m2.status WHEN 'approved' THEN 0 ELSE 1 END, m2.id
                LIMIT 1
            )
            FROM confraria_members m1
            GROUP BY m1.user_id, m1.confraria_id
        )
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    if removed > 0 {
        warn!("  Removed {} duplicate membership row(s)", removed);
    }

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_confraria_members_user_confraria \
         ON confraria_members (user_id, confraria_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
