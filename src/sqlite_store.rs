//! SQLite-backed [`Store`] implementation.
//!
//! Each trait method maps to one or two statements against the schema in
//! [`crate::migrate`]. Timeline phase 1 is a `GROUP BY` over active
//! annotations; neighbor ranking scans the `contents` table and scores in
//! Rust.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use cosine_core::embedding::{blob_to_vec, vec_to_blob};
use cosine_core::models::{timestamp_now, Annotation, AnnotationView, Content, CorpusStats, User};
use cosine_core::store::{ActivityMark, EmbeddingRow, PinnedRow, Store};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(us: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us).ok_or_else(|| anyhow!("timestamp out of range: {}", us))
}

fn opt_from_micros(us: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    us.map(from_micros).transpose()
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn annotation_from_row(row: &SqliteRow) -> Result<Annotation> {
    Ok(Annotation {
        id: row.get("id"),
        content_hash: row.get("content_hash"),
        owner_id: row.get("owner_id"),
        notes: row.get("notes"),
        created_at: from_micros(row.get("created_at"))?,
        pinned_at: opt_from_micros(row.get("pinned_at"))?,
        deleted_at: opt_from_micros(row.get("deleted_at"))?,
    })
}

fn view_from_row(row: &SqliteRow) -> Result<AnnotationView> {
    Ok(AnnotationView {
        id: row.get("id"),
        content_hash: row.get("content_hash"),
        owner_id: row.get("owner_id"),
        username: row.get("username"),
        notes: row.get("notes"),
        created_at: from_micros(row.get("created_at"))?,
        pinned_at: opt_from_micros(row.get("pinned_at"))?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        created_at: from_micros(row.get("created_at"))?,
    })
}

const ANNOTATION_COLUMNS: &str =
    "id, content_hash, owner_id, notes, created_at, pinned_at, deleted_at";

#[async_trait]
impl Store for SqliteStore {
    async fn insert_content_if_absent(&self, content: &Content) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO contents (hash, text, embedding, dims, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(hash) DO NOTHING
            "#,
        )
        .bind(&content.hash)
        .bind(&content.text)
        .bind(vec_to_blob(&content.embedding))
        .bind(content.embedding.len() as i64)
        .bind(to_micros(content.created_at))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_content(&self, hash: &str) -> Result<Option<Content>> {
        let row = sqlx::query(
            "SELECT hash, text, embedding, created_at FROM contents WHERE hash = ?",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            let blob: Vec<u8> = r.get("embedding");
            Ok(Content {
                hash: r.get("hash"),
                text: r.get("text"),
                embedding: blob_to_vec(&blob),
                created_at: from_micros(r.get("created_at"))?,
            })
        })
        .transpose()
    }

    async fn get_embedding(&self, hash: &str) -> Result<Option<Vec<f32>>> {
        let blob: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT embedding FROM contents WHERE hash = ?")
                .bind(hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(blob.map(|b| blob_to_vec(&b)))
    }

    async fn get_texts(&self, hashes: &[String]) -> Result<HashMap<String, String>> {
        if hashes.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT hash, text FROM contents WHERE hash IN ({})",
            placeholders(hashes.len())
        );
        let mut query = sqlx::query(&sql);
        for hash in hashes {
            query = query.bind(hash);
        }
        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|r| (r.get::<String, _>("hash"), r.get::<String, _>("text")))
            .collect())
    }

    async fn scan_embeddings(&self) -> Result<Vec<EmbeddingRow>> {
        let rows = sqlx::query("SELECT hash, embedding FROM contents")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let blob: Vec<u8> = r.get("embedding");
                EmbeddingRow {
                    hash: r.get("hash"),
                    embedding: blob_to_vec(&blob),
                }
            })
            .collect())
    }

    async fn insert_annotation(&self, annotation: &Annotation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO annotations (id, content_hash, owner_id, notes, created_at, pinned_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&annotation.id)
        .bind(&annotation.content_hash)
        .bind(&annotation.owner_id)
        .bind(&annotation.notes)
        .bind(to_micros(annotation.created_at))
        .bind(annotation.pinned_at.map(to_micros))
        .bind(annotation.deleted_at.map(to_micros))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn owner_annotations(&self, hash: &str, owner_id: &str) -> Result<Vec<Annotation>> {
        let sql = format!(
            "SELECT {} FROM annotations WHERE content_hash = ? AND owner_id = ? \
             ORDER BY created_at DESC, id ASC",
            ANNOTATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(hash)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(annotation_from_row).collect()
    }

    async fn set_pinned_at(
        &self,
        annotation_id: &str,
        pinned_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query("UPDATE annotations SET pinned_at = ? WHERE id = ?")
            .bind(pinned_at.map(to_micros))
            .bind(annotation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_deleted_at(&self, annotation_id: &str, deleted_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE annotations SET deleted_at = ? WHERE id = ?")
            .bind(to_micros(deleted_at))
            .bind(annotation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_active_for_owner(
        &self,
        hash: &str,
        owner_id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<usize> {
        let result = sqlx::query(
            "UPDATE annotations SET deleted_at = ? \
             WHERE content_hash = ? AND owner_id = ? AND deleted_at IS NULL",
        )
        .bind(to_micros(deleted_at))
        .bind(hash)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn active_annotations(&self, hashes: &[String]) -> Result<Vec<AnnotationView>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT a.id, a.content_hash, a.owner_id, u.username, a.notes, a.created_at, a.pinned_at
            FROM annotations a
            LEFT JOIN users u ON u.id = a.owner_id
            WHERE a.deleted_at IS NULL AND a.content_hash IN ({})
            ORDER BY a.created_at ASC, a.id ASC
            "#,
            placeholders(hashes.len())
        );
        let mut query = sqlx::query(&sql);
        for hash in hashes {
            query = query.bind(hash);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(view_from_row).collect()
    }

    async fn annotation_history(&self, hash: &str) -> Result<Vec<Annotation>> {
        let sql = format!(
            "SELECT {} FROM annotations WHERE content_hash = ? ORDER BY created_at ASC, id ASC",
            ANNOTATION_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(hash).fetch_all(&self.pool).await?;
        rows.iter().map(annotation_from_row).collect()
    }

    async fn latest_activity(
        &self,
        owner_id: Option<&str>,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ActivityMark>> {
        let before = before.map(to_micros);
        let rows = sqlx::query(
            r#"
            SELECT a.content_hash AS hash, c.text AS text, MAX(a.created_at) AS latest_at
            FROM annotations a
            JOIN contents c ON c.hash = a.content_hash
            WHERE a.deleted_at IS NULL
              AND (? IS NULL OR a.owner_id = ?)
            GROUP BY a.content_hash
            HAVING (? IS NULL OR MAX(a.created_at) < ?)
            ORDER BY latest_at DESC, hash ASC
            LIMIT ?
            "#,
        )
        .bind(owner_id)
        .bind(owner_id)
        .bind(before)
        .bind(before)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(ActivityMark {
                    hash: r.get("hash"),
                    text: r.get("text"),
                    latest_at: from_micros(r.get("latest_at"))?,
                })
            })
            .collect()
    }

    async fn pinned_annotations(
        &self,
        owner_id: &str,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<PinnedRow>> {
        let before = before.map(to_micros);
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.content_hash, a.owner_id, u.username, a.notes, a.created_at,
                   a.pinned_at, c.text
            FROM annotations a
            JOIN contents c ON c.hash = a.content_hash
            LEFT JOIN users u ON u.id = a.owner_id
            WHERE a.owner_id = ?
              AND a.deleted_at IS NULL
              AND a.pinned_at IS NOT NULL
              AND (? IS NULL OR a.pinned_at < ?)
            ORDER BY a.pinned_at DESC, a.id ASC
            LIMIT ?
            "#,
        )
        .bind(owner_id)
        .bind(before)
        .bind(before)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(PinnedRow {
                    text: r.get("text"),
                    annotation: view_from_row(r)?,
                })
            })
            .collect()
    }

    async fn annotated_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT content_hash) FROM annotations WHERE deleted_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count as usize)
    }

    async fn annotated_hash_at(&self, index: usize) -> Result<Option<String>> {
        let hash: Option<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT content_hash FROM annotations
            WHERE deleted_at IS NULL
            ORDER BY content_hash ASC
            LIMIT 1 OFFSET ?
            "#,
        )
        .bind(index as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hash)
    }

    async fn ensure_user(&self, id: &str) -> Result<User> {
        sqlx::query("INSERT INTO users (id, created_at) VALUES (?, ?) ON CONFLICT(id) DO NOTHING")
            .bind(id)
            .bind(to_micros(timestamp_now()))
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT id, username, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        user_from_row(&row)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username, created_at FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn set_username(&self, id: &str, username: &str) -> Result<()> {
        if let Some(existing) = self.find_user_by_username(username).await? {
            if existing.id != id {
                bail!("username '{}' is already taken", username);
            }
        }

        sqlx::query(
            r#"
            INSERT INTO users (id, username, created_at) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET username = excluded.username
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(to_micros(timestamp_now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn stats(&self) -> Result<CorpusStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM contents) AS contents,
                (SELECT COUNT(*) FROM annotations WHERE deleted_at IS NULL) AS active,
                (SELECT COUNT(*) FROM annotations WHERE deleted_at IS NOT NULL) AS deleted,
                (SELECT COUNT(*) FROM annotations
                    WHERE deleted_at IS NULL AND pinned_at IS NOT NULL) AS pinned,
                (SELECT COUNT(*) FROM contents c WHERE NOT EXISTS (
                    SELECT 1 FROM annotations a
                    WHERE a.content_hash = c.hash AND a.deleted_at IS NULL)) AS orphaned,
                (SELECT COUNT(DISTINCT owner_id) FROM annotations
                    WHERE deleted_at IS NULL) AS owners
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CorpusStats {
            contents: row.get("contents"),
            active_annotations: row.get("active"),
            deleted_annotations: row.get("deleted"),
            pinned_annotations: row.get("pinned"),
            orphaned_contents: row.get("orphaned"),
            owners: row.get("owners"),
        })
    }
}
