//! Database initialization
//!
//! Opens (creating if needed) the SQLite database, creates every table with
//! `CREATE TABLE IF NOT EXISTS`, then runs versioned migrations. Safe to call
//! on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Restricted to one connection that is never recycled, since every SQLite
/// in-memory connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables, run migrations, seed default settings
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_identity_tables(pool).await?;
    create_settings_table(pool).await?;
    create_catalog_tables(pool).await?;
    create_submissions_table(pool).await?;
    create_membership_table(pool).await?;
    create_community_tables(pool).await?;
    create_content_tables(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    init_default_settings(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Users and sessions, owned by the bundled identity provider
async fn create_identity_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password_hash TEXT NOT NULL,
            full_name TEXT,
            rank_override TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL,
            expires_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Stores application configuration key-value pairs
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_catalog_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS confrarias (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            motto TEXT,
            region TEXT NOT NULL,
            seal_url TEXT,
            seal_hint TEXT,
            cover_url TEXT,
            history TEXT,
            founders TEXT,
            responsible_user_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discovery_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // type_id has no ON DELETE action: the deletion guard counts references first
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discoveries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            slug TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            editorial TEXT NOT NULL,
            region TEXT NOT NULL,
            type_id INTEGER NOT NULL REFERENCES discovery_types(id),
            confraria_id INTEGER REFERENCES confrarias(id) ON DELETE SET NULL,
            address TEXT,
            website TEXT,
            phone TEXT,
            latitude REAL,
            longitude REAL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discovery_images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            discovery_id INTEGER NOT NULL REFERENCES discoveries(id) ON DELETE CASCADE,
            image_url TEXT NOT NULL,
            image_hint TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_submissions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            discovery_title TEXT NOT NULL,
            editorial TEXT NOT NULL,
            region TEXT NOT NULL,
            type_id INTEGER NOT NULL REFERENCES discovery_types(id),
            confraria_id INTEGER REFERENCES confrarias(id) ON DELETE SET NULL,
            links TEXT,
            website TEXT,
            image_url TEXT,
            date TIMESTAMP NOT NULL,
            status TEXT NOT NULL DEFAULT 'Pendente'
                CHECK (status IN ('Pendente', 'Aprovado', 'Rejeitado')),
            resolved_discovery_id INTEGER REFERENCES discoveries(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_membership_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS confraria_members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            confraria_id INTEGER NOT NULL REFERENCES confrarias(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'approved')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_community_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS seals (
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            discovery_id INTEGER NOT NULL REFERENCES discoveries(id) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, discovery_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS testimonials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            discovery_id INTEGER NOT NULL REFERENCES discoveries(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL,
            UNIQUE (user_id, discovery_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Confraria-scoped content: events, articles, recipes, gallery
async fn create_content_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            confraria_id INTEGER NOT NULL REFERENCES confrarias(id) ON DELETE CASCADE,
            author_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            event_date DATE NOT NULL,
            location TEXT,
            image_url TEXT,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            confraria_id INTEGER NOT NULL REFERENCES confrarias(id) ON DELETE CASCADE,
            author_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            image_url TEXT,
            status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published')),
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            confraria_id INTEGER NOT NULL REFERENCES confrarias(id) ON DELETE CASCADE,
            author_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            title TEXT NOT NULL,
            description TEXT,
            ingredients TEXT NOT NULL,
            instructions TEXT NOT NULL,
            image_url TEXT,
            status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published')),
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS confraria_gallery_images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            confraria_id INTEGER NOT NULL REFERENCES confrarias(id) ON DELETE CASCADE,
            image_url TEXT NOT NULL,
            description TEXT,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Ensure every known setting key exists
///
/// Empty values mean "not configured"; existing values are never touched.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, crate::db::settings::MAPBOX_API_KEY, "").await?;
    Ok(())
}

async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?;

    Ok(())
}
