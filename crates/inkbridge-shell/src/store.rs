// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Latest editor document per collaboration document id, backed by SQLite.
//
// `contentChanged` writes here; `fetchDocOnNetworkReconnect` and the next
// startup read from here.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::{debug, info, instrument};

use inkbridge_core::error::{InkbridgeError, Result};
use inkbridge_core::seed::SeedDocument;

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        doc_id TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        updated_at TEXT NOT NULL,
        revision INTEGER NOT NULL DEFAULT 1
    )
"#;

/// A stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub doc_id: String,
    pub document: SeedDocument,
    pub updated_at: DateTime<Utc>,
    /// Number of saves for this document id.
    pub revision: u64,
}

/// Document store backed by a SQLite database.
///
/// Synchronous like every `rusqlite` API; queries are small enough to run
/// inline from handlers.
pub struct DocumentStore {
    conn: Connection,
}

impl DocumentStore {
    /// Open (or create) the store at `path` in WAL mode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| InkbridgeError::Database(format!("open: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| InkbridgeError::Database(format!("WAL pragma: {e}")))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| InkbridgeError::Database(format!("create table: {e}")))?;

        info!("document store opened");
        Ok(Self { conn })
    }

    /// Open an in-memory store (tests, and the fallback when the data
    /// directory is unusable).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| InkbridgeError::Database(format!("open in-memory: {e}")))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| InkbridgeError::Database(format!("create table: {e}")))?;

        debug!("in-memory document store opened");
        Ok(Self { conn })
    }

    /// Replace the stored document for `doc_id`.
    #[instrument(skip(self, document), fields(timestamp = document.timestamp))]
    pub fn save(&self, doc_id: &str, document: &SeedDocument) -> Result<()> {
        let content = serde_json::to_string(&document.content)
            .map_err(|e| InkbridgeError::Database(format!("serialize content: {e}")))?;
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                "INSERT INTO documents (doc_id, content, timestamp, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(doc_id) DO UPDATE SET
                    content = excluded.content,
                    timestamp = excluded.timestamp,
                    updated_at = excluded.updated_at,
                    revision = revision + 1",
                params![doc_id, content, document.timestamp, now],
            )
            .map_err(|e| InkbridgeError::Database(format!("save document: {e}")))?;

        debug!("document saved");
        Ok(())
    }

    /// Save editor content as of now, stamped with the current time in
    /// milliseconds.
    pub fn save_content(&self, doc_id: &str, content: Value) -> Result<SeedDocument> {
        let document = SeedDocument::new(content, Utc::now().timestamp_millis());
        self.save(doc_id, &document)?;
        Ok(document)
    }

    /// Latest stored document for `doc_id`.
    pub fn latest(&self, doc_id: &str) -> Result<Option<StoredDocument>> {
        let row = self
            .conn
            .query_row(
                "SELECT content, timestamp, updated_at, revision FROM documents WHERE doc_id = ?1",
                params![doc_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| InkbridgeError::Database(format!("load document: {e}")))?;

        let Some((content, timestamp, updated_at, revision)) = row else {
            return Ok(None);
        };
        let content: Value = serde_json::from_str(&content)
            .map_err(|e| InkbridgeError::Database(format!("corrupt content for {doc_id}: {e}")))?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| InkbridgeError::Database(format!("corrupt updated_at for {doc_id}: {e}")))?;

        Ok(Some(StoredDocument {
            doc_id: doc_id.to_owned(),
            document: SeedDocument::new(content, timestamp),
            updated_at,
            revision: revision.max(0) as u64,
        }))
    }

    /// Drop the stored document for `doc_id`. Returns whether one existed.
    pub fn remove(&self, doc_id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM documents WHERE doc_id = ?1", params![doc_id])
            .map_err(|e| InkbridgeError::Database(format!("remove document: {e}")))?;
        Ok(removed > 0)
    }

    /// Ids with a stored document, sorted.
    pub fn doc_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT doc_id FROM documents ORDER BY doc_id")
            .map_err(|e| InkbridgeError::Database(format!("prepare: {e}")))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| InkbridgeError::Database(format!("query: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| InkbridgeError::Database(format!("row: {e}")))?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_store_has_nothing() {
        let store = DocumentStore::open_in_memory().unwrap();
        assert!(store.latest("demo-document").unwrap().is_none());
    }

    #[test]
    fn save_replaces_and_counts_revisions() {
        let store = DocumentStore::open_in_memory().unwrap();
        store
            .save("demo-document", &SeedDocument::new(json!({"ops": [{"insert": "a\n"}]}), 1))
            .unwrap();
        store
            .save("demo-document", &SeedDocument::new(json!({"ops": [{"insert": "b\n"}]}), 2))
            .unwrap();

        let latest = store.latest("demo-document").unwrap().unwrap();
        assert_eq!(latest.document.content, json!({"ops": [{"insert": "b\n"}]}));
        assert_eq!(latest.document.timestamp, 2);
        assert_eq!(latest.revision, 2);
        assert_eq!(store.doc_ids().unwrap(), vec!["demo-document"]);
    }

    #[test]
    fn save_content_stamps_current_time() {
        let store = DocumentStore::open_in_memory().unwrap();
        let before = Utc::now().timestamp_millis();
        let saved = store.save_content("d", json!({"ops": []})).unwrap();
        assert!(saved.is_authoritative());
        assert!(saved.timestamp >= before);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documents.db");
        {
            let store = DocumentStore::open(&path).unwrap();
            store.save("d", &SeedDocument::untimed(json!({"ops": []}))).unwrap();
        }
        let store = DocumentStore::open(&path).unwrap();
        let latest = store.latest("d").unwrap().unwrap();
        assert_eq!(latest.document.timestamp, -1);
        assert!(store.remove("d").unwrap());
        assert!(!store.remove("d").unwrap());
    }
}
