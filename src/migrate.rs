//! Idempotent schema setup.
//!
//! Timestamps are INTEGER unix microseconds; embeddings are little-endian
//! f32 BLOBs. Every statement is `IF NOT EXISTS`, so running it against an
//! initialized database is a no-op.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// `cosine init`: open the configured database and apply the schema.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contents (
            hash TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS annotations (
            id TEXT PRIMARY KEY,
            content_hash TEXT NOT NULL,
            owner_id TEXT NOT NULL DEFAULT 'anon',
            notes TEXT,
            created_at INTEGER NOT NULL,
            pinned_at INTEGER,
            deleted_at INTEGER,
            FOREIGN KEY (content_hash) REFERENCES contents(hash)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT UNIQUE,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_annotations_content_hash ON annotations(content_hash)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_annotations_owner_created ON annotations(owner_id, created_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_annotations_owner_pinned ON annotations(owner_id, pinned_at DESC)",
    )
    .execute(pool)
    .await?;

    tracing::debug!("schema applied");
    Ok(())
}
