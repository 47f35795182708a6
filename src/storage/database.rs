//! SQLite document store with migrations and FTS5 keyword mirror
//!
//! The primary `documents` table holds one row per indexed message. An
//! external-content FTS5 table mirrors sender/subject/content through
//! row-level triggers, so keyword state follows every mutation without any
//! component writing to it directly.

use crate::embedding::{decode_vector, encode_vector};
use crate::error::Result;
use crate::storage::IndexedDocument;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

const META_DIMENSION_KEY: &str = "embedding_dimension";

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: documents table, FTS5 mirror, lockstep triggers, index metadata
    r#"
    CREATE TABLE documents (
        id TEXT PRIMARY KEY,
        source_id TEXT,
        content TEXT NOT NULL,
        sender TEXT NOT NULL,
        subject TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        metadata TEXT NOT NULL,
        embedding BLOB
    );

    CREATE UNIQUE INDEX idx_documents_source_id
        ON documents(source_id) WHERE source_id IS NOT NULL;
    CREATE INDEX idx_documents_timestamp ON documents(timestamp);

    CREATE VIRTUAL TABLE documents_fts USING fts5(
        sender, subject, content,
        content='documents', content_rowid='rowid'
    );

    CREATE TRIGGER trg_documents_fts_insert AFTER INSERT ON documents BEGIN
        INSERT INTO documents_fts(rowid, sender, subject, content)
        VALUES (new.rowid, new.sender, new.subject, new.content);
    END;

    CREATE TRIGGER trg_documents_fts_update AFTER UPDATE ON documents BEGIN
        INSERT INTO documents_fts(documents_fts, rowid, sender, subject, content)
        VALUES ('delete', old.rowid, old.sender, old.subject, old.content);
        INSERT INTO documents_fts(rowid, sender, subject, content)
        VALUES (new.rowid, new.sender, new.subject, new.content);
    END;

    CREATE TRIGGER trg_documents_fts_delete AFTER DELETE ON documents BEGIN
        INSERT INTO documents_fts(documents_fts, rowid, sender, subject, content)
        VALUES ('delete', old.rowid, old.sender, old.subject, old.content);
    END;

    CREATE TABLE index_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    "#,
];

/// A keyword-tier match: the document, a highlighted snippet, and a
/// BM25-derived relevance score (higher is better)
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub document: IndexedDocument,
    pub snippet: String,
    pub score: f32,
}

/// Row counts for the index
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    pub document_count: usize,
    pub embedded_count: usize,
}

/// Document store operations over the gate-owned connection
///
/// All functions take `&Connection` and are only ever invoked from inside
/// the serial access gate's worker thread.
pub struct DocumentStore;

impl DocumentStore {
    /// Open the database file, configure the connection, and run migrations
    pub fn open(db_path: &Path) -> Result<Connection> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| crate::error::MaildexError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        Self::migrate(&conn)?;
        Ok(conn)
    }

    /// Run database migrations; idempotent, safe on every startup
    fn migrate(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);
                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Insert or replace a document
    ///
    /// A row sharing the same `source_id` is replaced, never duplicated.
    /// Explicit delete-then-insert keeps the FTS triggers on the simple
    /// insert/delete paths.
    pub fn upsert(conn: &Connection, doc: &IndexedDocument) -> Result<()> {
        if let Some(source_id) = &doc.source_id {
            conn.execute(
                "DELETE FROM documents WHERE source_id = ?1",
                params![source_id],
            )?;
        }
        conn.execute(
            "DELETE FROM documents WHERE id = ?1",
            params![doc.id.to_string()],
        )?;

        let metadata_json =
            serde_json::to_string(&doc.metadata).map_err(|e| crate::error::MaildexError::Json {
                source: e,
                context: format!("Failed to serialize metadata for document {}", doc.id),
            })?;
        let embedding_blob = doc.embedding.as_ref().map(|v| encode_vector(v));

        conn.execute(
            "INSERT INTO documents (id, source_id, content, sender, subject, timestamp, metadata, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                doc.id.to_string(),
                doc.source_id,
                doc.content,
                doc.sender,
                doc.subject,
                doc.timestamp.timestamp_millis(),
                metadata_json,
                embedding_blob,
            ],
        )?;

        Ok(())
    }

    /// Delete a document by id
    pub fn delete(conn: &Connection, id: Uuid) -> Result<bool> {
        let affected = conn.execute(
            "DELETE FROM documents WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Fetch a single document by id
    pub fn get(conn: &Connection, id: Uuid) -> Result<Option<IndexedDocument>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM documents WHERE id = ?1",
            DOCUMENT_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![id.to_string()], row_to_document)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Scan every document
    pub fn scan_all(conn: &Connection) -> Result<Vec<IndexedDocument>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM documents ORDER BY timestamp DESC",
            DOCUMENT_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_document)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Scan only documents that carry an embedding blob
    pub fn scan_embedded(conn: &Connection) -> Result<Vec<IndexedDocument>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM documents WHERE embedding IS NOT NULL",
            DOCUMENT_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_document)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Most-recent-first sample of documents, bounded by `limit`
    pub fn sample_recent(conn: &Connection, limit: usize) -> Result<Vec<IndexedDocument>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM documents ORDER BY timestamp DESC LIMIT ?1",
            DOCUMENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], row_to_document)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Ranked full-text search against the FTS5 mirror
    ///
    /// `match_expr` is an FTS5 MATCH expression. Results come back best
    /// first with a highlighted snippet drawn from the content column.
    pub fn keyword_search(
        conn: &Connection,
        match_expr: &str,
        limit: usize,
    ) -> Result<Vec<KeywordHit>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {}, snippet(documents_fts, 2, '[', ']', '…', 12), bm25(documents_fts)
             FROM documents_fts
             JOIN documents d ON d.rowid = documents_fts.rowid
             WHERE documents_fts MATCH ?1
             ORDER BY bm25(documents_fts)
             LIMIT ?2",
            prefixed_document_columns()
        ))?;

        let rows = stmt.query_map(params![match_expr, limit as i64], |row| {
            let document = row_to_document(row)?;
            let snippet: String = row.get(8)?;
            let rank: f64 = row.get(9)?;
            Ok(KeywordHit {
                document,
                snippet,
                // FTS5 bm25() is more negative for better matches
                score: -rank as f32,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Regenerate the FTS5 mirror from the documents table
    ///
    /// Invoked after every bulk-insert pass; trigger-based incremental
    /// updates are not trusted across bulk operations.
    pub fn rebuild_fts(conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO documents_fts(documents_fts) VALUES ('rebuild')",
            [],
        )?;
        Ok(())
    }

    /// Remove every document and reset the recorded dimensionality
    pub fn clear(conn: &Connection) -> Result<()> {
        conn.execute("DELETE FROM documents", [])?;
        conn.execute(
            "DELETE FROM index_meta WHERE key = ?1",
            params![META_DIMENSION_KEY],
        )?;
        Self::rebuild_fts(conn)?;
        Ok(())
    }

    /// Row counts
    pub fn stats(conn: &Connection) -> Result<StoreStats> {
        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let embedded_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE embedding IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(StoreStats {
            document_count: document_count as usize,
            embedded_count: embedded_count as usize,
        })
    }

    /// The embedding dimensionality this index was built with, if any
    pub fn recorded_dimension(conn: &Connection) -> Result<Option<usize>> {
        let mut stmt = conn.prepare_cached("SELECT value FROM index_meta WHERE key = ?1")?;
        let mut rows = stmt.query_map(params![META_DIMENSION_KEY], |row| {
            let value: String = row.get(0)?;
            value.parse::<usize>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
            })
        })?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Record the embedding dimensionality of the index
    pub fn record_dimension(conn: &Connection, dimension: usize) -> Result<()> {
        conn.execute(
            "INSERT INTO index_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![META_DIMENSION_KEY, dimension.to_string()],
        )?;
        Ok(())
    }
}

const DOCUMENT_COLUMNS: &str =
    "id, source_id, content, sender, subject, timestamp, metadata, embedding";

fn prefixed_document_columns() -> String {
    DOCUMENT_COLUMNS
        .split(", ")
        .map(|c| format!("d.{}", c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Map a row selected with [`DOCUMENT_COLUMNS`] to an [`IndexedDocument`]
///
/// A malformed embedding blob on a single row is dropped here with a
/// warning rather than failing the whole scan.
fn row_to_document(row: &Row<'_>) -> rusqlite::Result<IndexedDocument> {
    let id_text: String = row.get(0)?;
    let id = Uuid::parse_str(&id_text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

    let timestamp_millis: i64 = row.get(5)?;
    let timestamp: DateTime<Utc> = DateTime::from_timestamp_millis(timestamp_millis)
        .unwrap_or_else(|| DateTime::from_timestamp_millis(0).unwrap());

    let metadata_json: String = row.get(6)?;
    let metadata: HashMap<String, String> = serde_json::from_str(&metadata_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    let embedding_blob: Option<Vec<u8>> = row.get(7)?;
    let embedding = match embedding_blob {
        Some(blob) => match decode_vector(&blob) {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!("Skipping malformed embedding for document {}: {}", id, e);
                None
            }
        },
        None => None,
    };

    Ok(IndexedDocument {
        id,
        source_id: row.get(1)?,
        content: row.get(2)?,
        sender: row.get(3)?,
        subject: row.get(4)?,
        timestamp,
        metadata,
        embedding,
    })
}
