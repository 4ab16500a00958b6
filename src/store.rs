//! SQLite persistence for watched documents.
//!
//! One `documents` table holds every registered publication. Each stage
//! selects its backlog by [`DocumentStatus`] and writes its output through a
//! guarded transition (`UPDATE … WHERE id = ? AND status = ?`), so a stage
//! can never skip ahead of the one before it.
//!
//! `matched_keywords` is a JSON array in its column; it is encoded and
//! decoded only here.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteQueryResult, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::{Result, WatchError};
use crate::models::{Document, DocumentStatus, NewDocument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    source              TEXT NOT NULL,
    title               TEXT NOT NULL,
    origin_url          TEXT NOT NULL,
    local_path          TEXT NOT NULL,
    content_fingerprint TEXT NOT NULL,
    status              TEXT NOT NULL DEFAULT 'fetched',
    translated_text     TEXT,
    analysis_summary    TEXT,
    matched_keywords    TEXT,
    notified_at         TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_documents_source_fingerprint
    ON documents (source, content_fingerprint);
CREATE INDEX IF NOT EXISTS idx_documents_status
    ON documents (status);
CREATE INDEX IF NOT EXISTS idx_documents_created_at
    ON documents (created_at DESC);
"#;

const COLUMNS: &str = "id, source, title, origin_url, local_path, content_fingerprint, status, \
     translated_text, analysis_summary, matched_keywords, notified_at, created_at, updated_at";

/// Handle to the document table.
#[derive(Clone, Debug)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    /// Open (creating if needed) the database file and ensure the schema.
    #[instrument(level = "info", skip_all, fields(path = %db_path.display()))]
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        info!("Document store ready");
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Look up a document by its dedup key.
    pub async fn find_by_fingerprint(
        &self,
        source: &str,
        fingerprint: &str,
    ) -> Result<Option<Document>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM documents WHERE source = ? AND content_fingerprint = ?"
        );
        let row = sqlx::query(&sql)
            .bind(source)
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| document_from_row(&r)).transpose()
    }

    pub async fn get(&self, id: i64) -> Result<Option<Document>> {
        let sql = format!("SELECT {COLUMNS} FROM documents WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| document_from_row(&r)).transpose()
    }

    /// Register a new document in the `fetched` state.
    ///
    /// Returns `None` when `(source, content_fingerprint)` is already known.
    pub async fn insert(&self, doc: &NewDocument) -> Result<Option<i64>> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO documents
                (source, title, origin_url, local_path, content_fingerprint, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.source)
        .bind(&doc.title)
        .bind(&doc.origin_url)
        .bind(doc.local_path.to_string_lossy().into_owned())
        .bind(&doc.content_fingerprint)
        .bind(DocumentStatus::Fetched.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(source = %doc.source, fingerprint = %doc.content_fingerprint, "Insert ignored; fingerprint already known");
            return Ok(None);
        }
        Ok(Some(result.last_insert_rowid()))
    }

    /// Every document currently waiting in `status`, oldest first.
    pub async fn backlog(&self, status: DocumentStatus) -> Result<Vec<Document>> {
        let sql = format!("SELECT {COLUMNS} FROM documents WHERE status = ? ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(document_from_row).collect()
    }

    /// `fetched -> translated`
    pub async fn record_translation(&self, id: i64, translated_text: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET translated_text = ?, status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(translated_text)
        .bind(DocumentStatus::Translated.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(DocumentStatus::Fetched.as_str())
        .execute(&self.pool)
        .await?;
        ensure_transitioned(&result, id, DocumentStatus::Fetched)
    }

    /// `translated -> analyzed`; summary and keywords are written together.
    pub async fn record_analysis(
        &self,
        id: i64,
        summary: &str,
        matched_keywords: &[String],
    ) -> Result<()> {
        let keywords = serde_json::to_string(matched_keywords)?;
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET analysis_summary = ?, matched_keywords = ?, status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(summary)
        .bind(keywords)
        .bind(DocumentStatus::Analyzed.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(DocumentStatus::Translated.as_str())
        .execute(&self.pool)
        .await?;
        ensure_transitioned(&result, id, DocumentStatus::Translated)
    }

    /// `analyzed -> notified`
    pub async fn mark_notified(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let at = at.to_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET notified_at = ?, status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(&at)
        .bind(DocumentStatus::Notified.as_str())
        .bind(&at)
        .bind(id)
        .bind(DocumentStatus::Analyzed.as_str())
        .execute(&self.pool)
        .await?;
        ensure_transitioned(&result, id, DocumentStatus::Analyzed)
    }

    /// Most recently registered documents first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<Document>> {
        let sql =
            format!("SELECT {COLUMNS} FROM documents ORDER BY created_at DESC, id DESC LIMIT ?");
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(document_from_row).collect()
    }
}

fn ensure_transitioned(result: &SqliteQueryResult, id: i64, expected: DocumentStatus) -> Result<()> {
    if result.rows_affected() == 0 {
        return Err(WatchError::InvalidTransition { id, expected });
    }
    Ok(())
}

fn decode_error(column: &str, reason: impl std::fmt::Display) -> WatchError {
    WatchError::Store(sqlx::Error::Decode(
        format!("column {column}: {reason}").into(),
    ))
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_error(column, e))
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<DocumentStatus>()
        .map_err(|e| decode_error("status", e))?;

    let matched_keywords = row
        .try_get::<Option<String>, _>("matched_keywords")?
        .map(|raw| serde_json::from_str::<Vec<String>>(&raw))
        .transpose()
        .map_err(|e| decode_error("matched_keywords", e))?;

    let notified_at = row
        .try_get::<Option<String>, _>("notified_at")?
        .map(|raw| parse_timestamp("notified_at", &raw))
        .transpose()?;

    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let local_path: String = row.try_get("local_path")?;

    Ok(Document {
        id: row.try_get("id")?,
        source: row.try_get("source")?,
        title: row.try_get("title")?,
        origin_url: row.try_get("origin_url")?,
        local_path: PathBuf::from(local_path),
        content_fingerprint: row.try_get("content_fingerprint")?,
        status,
        translated_text: row.try_get("translated_text")?,
        analysis_summary: row.try_get("analysis_summary")?,
        matched_keywords,
        notified_at,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, DocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(&dir.path().join("metadata.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn new_doc(source: &str, fingerprint: &str) -> NewDocument {
        NewDocument {
            source: source.to_string(),
            title: "Circular 2025/1".to_string(),
            origin_url: format!("https://example.com/{fingerprint}.pdf"),
            local_path: PathBuf::from(format!("/tmp/{fingerprint}.pdf")),
            content_fingerprint: fingerprint.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let (_dir, store) = open_store().await;
        let id = store.insert(&new_doc("BCL", "abc")).await.unwrap().unwrap();

        let found = store.find_by_fingerprint("BCL", "abc").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.status, DocumentStatus::Fetched);
        assert!(found.translated_text.is_none());
        assert!(found.matched_keywords.is_none());
        assert!(found.notified_at.is_none());

        assert!(store.find_by_fingerprint("ECB", "abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_fingerprint_is_ignored_per_source() {
        let (_dir, store) = open_store().await;
        assert!(store.insert(&new_doc("BCL", "same")).await.unwrap().is_some());
        assert!(store.insert(&new_doc("BCL", "same")).await.unwrap().is_none());
        // Same bytes from another authority are a different document.
        assert!(store.insert(&new_doc("ECB", "same")).await.unwrap().is_some());
        assert_eq!(store.recent(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_transitions_follow_stage_order() {
        let (_dir, store) = open_store().await;
        let id = store.insert(&new_doc("BCL", "abc")).await.unwrap().unwrap();

        // Analysis and notification before translation are rejected.
        let err = store
            .record_analysis(id, "summary", &["liquidity".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WatchError::InvalidTransition { expected: DocumentStatus::Translated, .. }
        ));
        assert!(store.mark_notified(id, Utc::now()).await.is_err());

        store.record_translation(id, "translated").await.unwrap();
        // Translation is set once.
        assert!(store.record_translation(id, "again").await.is_err());
        assert!(store.mark_notified(id, Utc::now()).await.is_err());

        let keywords = vec!["liquidity".to_string(), "Basel".to_string()];
        store.record_analysis(id, "summary", &keywords).await.unwrap();
        store.mark_notified(id, Utc::now()).await.unwrap();

        let doc = store.get(id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Notified);
        assert_eq!(doc.translated_text.as_deref(), Some("translated"));
        assert_eq!(doc.analysis_summary.as_deref(), Some("summary"));
        assert_eq!(doc.matched_keywords, Some(keywords));
        assert!(doc.notified_at.is_some());
    }

    #[tokio::test]
    async fn test_backlog_selects_by_status() {
        let (_dir, store) = open_store().await;
        let first = store.insert(&new_doc("BCL", "one")).await.unwrap().unwrap();
        let second = store.insert(&new_doc("BCL", "two")).await.unwrap().unwrap();
        store.record_translation(first, "text").await.unwrap();

        let fetched = store.backlog(DocumentStatus::Fetched).await.unwrap();
        assert_eq!(fetched.iter().map(|d| d.id).collect::<Vec<_>>(), vec![second]);

        let translated = store.backlog(DocumentStatus::Translated).await.unwrap();
        assert_eq!(translated.iter().map(|d| d.id).collect::<Vec<_>>(), vec![first]);

        assert!(store.backlog(DocumentStatus::Analyzed).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_keyword_list_round_trips() {
        let (_dir, store) = open_store().await;
        let id = store.insert(&new_doc("BCL", "abc")).await.unwrap().unwrap();
        store.record_translation(id, "text").await.unwrap();
        store.record_analysis(id, "nothing relevant", &[]).await.unwrap();

        let doc = store.get(id).await.unwrap().unwrap();
        assert_eq!(doc.matched_keywords, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_reopen_keeps_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("metadata.db");
        {
            let store = DocumentStore::open(&path).await.unwrap();
            store.insert(&new_doc("BCL", "abc")).await.unwrap();
        }
        let store = DocumentStore::open(&path).await.unwrap();
        assert_eq!(store.recent(5).await.unwrap().len(), 1);
    }
}
