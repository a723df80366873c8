use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::aggregator::Chunk;

/// Fields supplied by the caller when creating a document
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub name: String,
    pub url_internal: Option<String>,
    pub url_external: Option<String>,
    pub file_size: Option<u64>,
    pub sha_hash: Option<String>,
    pub language: Option<String>,
    pub doc_title: Option<String>,
    pub doc_authors: Vec<String>,
    pub doc_keywords: Vec<String>,
}

/// One transcribed media item and its metadata, owning a set of chunks.
/// Chunks hold the back-reference; the document never embeds them.
#[derive(Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub url_internal: Option<String>,
    pub url_external: Option<String>,
    pub upload_time: DateTime<Utc>,
    pub file_size: Option<u64>,
    pub sha_hash: Option<String>,
    pub language: Option<String>,
    pub doc_title: Option<String>,
    pub doc_authors: Vec<String>,
    pub doc_keywords: Vec<String>,
    pub is_archived: bool,
    pub is_deleted: bool,
}

/// A chunk row as persisted; `chunk_page` carries the aggregator's
/// sequence number and is the sole ordering key
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_page: u32,
    pub chunk_text: String,
    pub token_count: usize,
    pub word_count: usize,
    pub start_offset_ms: u64,
    pub end_offset_ms: u64,
}

impl From<StoredChunk> for Chunk {
    fn from(stored: StoredChunk) -> Self {
        Chunk {
            sequence_number: stored.chunk_page,
            text: stored.chunk_text,
            token_count: stored.token_count,
            word_count: stored.word_count,
            start_offset_ms: stored.start_offset_ms,
            end_offset_ms: stored.end_offset_ms,
        }
    }
}

/// Optional field changes for an existing document; `None` leaves the
/// stored value untouched
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub doc_title: Option<String>,
    pub doc_authors: Option<Vec<String>>,
    pub doc_keywords: Option<Vec<String>>,
    pub is_archived: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentStats {
    pub document_id: String,
    pub name: String,
    pub upload_time: DateTime<Utc>,
    pub file_size: Option<u64>,
    pub chunk_count: u32,
    pub is_archived: bool,
    pub is_deleted: bool,
}

pub struct TranscriptDb {
    conn: Connection,
}

impl TranscriptDb {
    /// Create a new in-memory database
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to create in-memory database")?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS document (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                url_internal TEXT,
                url_external TEXT,
                upload_time TEXT NOT NULL,
                file_size INTEGER,
                sha_hash TEXT,
                language TEXT,
                doc_title TEXT,
                doc_authors TEXT NOT NULL,
                doc_keywords TEXT NOT NULL,
                is_archived INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS chunk (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                chunk_page INTEGER NOT NULL,
                chunk_text TEXT NOT NULL,
                token_count INTEGER NOT NULL,
                word_count INTEGER NOT NULL,
                start_offset_ms INTEGER NOT NULL,
                end_offset_ms INTEGER NOT NULL,
                FOREIGN KEY (document_id) REFERENCES document(id),
                UNIQUE (document_id, chunk_page)
            );

            CREATE INDEX IF NOT EXISTS idx_chunk_document ON chunk(document_id);
            "#,
            )
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    /// Create a document record, returning its generated id
    pub fn create_document(&self, fields: &NewDocument) -> Result<String> {
        let document_id = Uuid::new_v4().to_string();
        let authors = serde_json::to_string(&fields.doc_authors)?;
        let keywords = serde_json::to_string(&fields.doc_keywords)?;

        self.conn
            .execute(
                "INSERT INTO document (id, name, url_internal, url_external, upload_time, \
                 file_size, sha_hash, language, doc_title, doc_authors, doc_keywords, \
                 is_archived, is_deleted) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, 0)",
                params![
                    document_id,
                    fields.name,
                    fields.url_internal,
                    fields.url_external,
                    Utc::now().to_rfc3339(),
                    fields.file_size,
                    fields.sha_hash,
                    fields.language,
                    fields.doc_title,
                    authors,
                    keywords,
                ],
            )
            .with_context(|| format!("Failed to create document: {}", fields.name))?;

        info!(document_id = %document_id, name = %fields.name, "Created document");
        Ok(document_id)
    }

    /// Persist a finished chunk sequence for one document as a single
    /// transaction. All rows land or none do.
    pub fn create_chunks_batch(
        &mut self,
        document_id: &str,
        chunks: &[Chunk],
    ) -> Result<Vec<String>> {
        let tx = self
            .conn
            .transaction()
            .context("Failed to start chunk batch transaction")?;

        let mut chunk_ids = Vec::with_capacity(chunks.len());
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunk (id, document_id, chunk_page, chunk_text, token_count, \
                     word_count, start_offset_ms, end_offset_ms) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .context("Failed to prepare chunk insert")?;

            for chunk in chunks {
                let chunk_id = Uuid::new_v4().to_string();
                stmt.execute(params![
                    chunk_id,
                    document_id,
                    chunk.sequence_number,
                    chunk.text,
                    chunk.token_count,
                    chunk.word_count,
                    chunk.start_offset_ms,
                    chunk.end_offset_ms,
                ])
                .with_context(|| {
                    format!("Failed to insert chunk {}", chunk.sequence_number)
                })?;
                chunk_ids.push(chunk_id);
            }
        }

        tx.commit().context("Failed to commit chunk batch")?;
        info!(
            document_id = %document_id,
            chunk_count = chunk_ids.len(),
            "Stored chunk batch"
        );
        Ok(chunk_ids)
    }

    /// Get a document by id
    pub fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, url_internal, url_external, upload_time, file_size, \
                 sha_hash, language, doc_title, doc_authors, doc_keywords, is_archived, \
                 is_deleted FROM document WHERE id = ?1",
            )
            .context("Failed to prepare statement")?;

        let mut rows = stmt
            .query_map(params![document_id], document_from_row)
            .context("Failed to query document")?;

        rows.next().transpose().context("Failed to read document row")
    }

    /// Get all chunks for a document, ordered by their sequence number
    pub fn get_chunks_by_document(&self, document_id: &str) -> Result<Vec<StoredChunk>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, document_id, chunk_page, chunk_text, token_count, word_count, \
                 start_offset_ms, end_offset_ms \
                 FROM chunk WHERE document_id = ?1 ORDER BY chunk_page",
            )
            .context("Failed to prepare statement")?;

        let chunks = stmt
            .query_map(params![document_id], |row| {
                Ok(StoredChunk {
                    id: row.get(0)?,
                    document_id: row.get(1)?,
                    chunk_page: row.get(2)?,
                    chunk_text: row.get(3)?,
                    token_count: row.get(4)?,
                    word_count: row.get(5)?,
                    start_offset_ms: row.get(6)?,
                    end_offset_ms: row.get(7)?,
                })
            })
            .context("Failed to query chunks")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect chunks")?;

        Ok(chunks)
    }

    /// Get statistics for a document
    pub fn get_document_stats(&self, document_id: &str) -> Result<Option<DocumentStats>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT d.id, d.name, d.upload_time, d.file_size, COUNT(c.id), \
                 d.is_archived, d.is_deleted \
                 FROM document d LEFT JOIN chunk c ON d.id = c.document_id \
                 WHERE d.id = ?1 \
                 GROUP BY d.id, d.name, d.upload_time, d.file_size, d.is_archived, d.is_deleted",
            )
            .context("Failed to prepare statement")?;

        let mut rows = stmt
            .query_map(params![document_id], |row| {
                Ok(DocumentStats {
                    document_id: row.get(0)?,
                    name: row.get(1)?,
                    upload_time: parse_timestamp(row, 2)?,
                    file_size: row.get(3)?,
                    chunk_count: row.get(4)?,
                    is_archived: row.get(5)?,
                    is_deleted: row.get(6)?,
                })
            })
            .context("Failed to query document stats")?;

        rows.next().transpose().context("Failed to read stats row")
    }

    /// Update document fields in place. Only the fields set in `update`
    /// change; this is also the mechanism for archiving a document.
    pub fn update_document(&self, document_id: &str, update: &DocumentUpdate) -> Result<bool> {
        let authors = update
            .doc_authors
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let keywords = update
            .doc_keywords
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let updated = self
            .conn
            .execute(
                "UPDATE document SET \
                 doc_title = COALESCE(?1, doc_title), \
                 doc_authors = COALESCE(?2, doc_authors), \
                 doc_keywords = COALESCE(?3, doc_keywords), \
                 is_archived = COALESCE(?4, is_archived) \
                 WHERE id = ?5",
                params![
                    update.doc_title,
                    authors,
                    keywords,
                    update.is_archived,
                    document_id,
                ],
            )
            .with_context(|| format!("Failed to update document: {document_id}"))?;

        if updated > 0 {
            info!(document_id = %document_id, "Updated document");
        }
        Ok(updated > 0)
    }

    /// Delete a document. Soft delete marks the row inactive; hard delete
    /// removes the document and cascades to its chunks.
    pub fn delete_document(&mut self, document_id: &str, soft: bool) -> Result<bool> {
        if soft {
            let updated = self
                .conn
                .execute(
                    "UPDATE document SET is_deleted = 1 WHERE id = ?1",
                    params![document_id],
                )
                .context("Failed to soft delete document")?;
            if updated > 0 {
                info!(document_id = %document_id, "Soft deleted document");
            }
            Ok(updated > 0)
        } else {
            let tx = self
                .conn
                .transaction()
                .context("Failed to start delete transaction")?;
            tx.execute(
                "DELETE FROM chunk WHERE document_id = ?1",
                params![document_id],
            )
            .context("Failed to delete chunks")?;
            let deleted = tx
                .execute("DELETE FROM document WHERE id = ?1", params![document_id])
                .context("Failed to delete document")?;
            tx.commit().context("Failed to commit delete")?;
            if deleted > 0 {
                info!(document_id = %document_id, "Hard deleted document");
            }
            Ok(deleted > 0)
        }
    }
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        name: row.get(1)?,
        url_internal: row.get(2)?,
        url_external: row.get(3)?,
        upload_time: parse_timestamp(row, 4)?,
        file_size: row.get(5)?,
        sha_hash: row.get(6)?,
        language: row.get(7)?,
        doc_title: row.get(8)?,
        doc_authors: parse_string_list(row, 9)?,
        doc_keywords: parse_string_list(row, 10)?,
        is_archived: row.get(11)?,
        is_deleted: row.get(12)?,
    })
}

fn parse_timestamp(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn parse_string_list(row: &Row<'_>, index: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(index)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

/// Build document fields from a local media file: name from the file name,
/// byte size, and a hex SHA-256 content hash
pub fn document_from_media(
    path: &Path,
    doc_title: Option<String>,
    doc_authors: Vec<String>,
    doc_keywords: Vec<String>,
    language: Option<String>,
) -> Result<NewDocument> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read media file: {}", path.display()))?;
    let sha_hash = hex::encode(Sha256::digest(&data));

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.clone());

    Ok(NewDocument {
        name,
        url_internal: Some(path.display().to_string()),
        url_external: None,
        file_size: Some(data.len() as u64),
        sha_hash: Some(sha_hash),
        language,
        doc_title: doc_title.or(Some(stem)),
        doc_authors,
        doc_keywords,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunks() -> Vec<Chunk> {
        vec![
            Chunk {
                sequence_number: 1,
                text: "first chunk".to_string(),
                token_count: 2,
                word_count: 2,
                start_offset_ms: 0,
                end_offset_ms: 3_000,
            },
            Chunk {
                sequence_number: 2,
                text: "second chunk".to_string(),
                token_count: 2,
                word_count: 2,
                start_offset_ms: 3_000,
                end_offset_ms: 6_000,
            },
        ]
    }

    fn sample_document() -> NewDocument {
        NewDocument {
            name: "lecture.mp4".to_string(),
            doc_title: Some("Lecture".to_string()),
            doc_authors: vec!["A. Speaker".to_string()],
            doc_keywords: vec!["lecture".to_string(), "intro".to_string()],
            language: Some("en-US".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_get_document() {
        let db = TranscriptDb::new_in_memory().unwrap();
        let id = db.create_document(&sample_document()).unwrap();

        let doc = db.get_document(&id).unwrap().unwrap();
        assert_eq!(doc.name, "lecture.mp4");
        assert_eq!(doc.doc_authors, vec!["A. Speaker"]);
        assert_eq!(doc.doc_keywords.len(), 2);
        assert!(!doc.is_deleted);
        assert!(!doc.is_archived);
    }

    #[test]
    fn test_missing_document_is_none() {
        let db = TranscriptDb::new_in_memory().unwrap();
        assert!(db.get_document("no-such-id").unwrap().is_none());
        assert!(db.get_document_stats("no-such-id").unwrap().is_none());
    }

    #[test]
    fn test_chunk_batch_round_trip_in_order() {
        let mut db = TranscriptDb::new_in_memory().unwrap();
        let id = db.create_document(&sample_document()).unwrap();

        let ids = db.create_chunks_batch(&id, &sample_chunks()).unwrap();
        assert_eq!(ids.len(), 2);

        let stored = db.get_chunks_by_document(&id).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].chunk_page, 1);
        assert_eq!(stored[0].chunk_text, "first chunk");
        assert_eq!(stored[1].chunk_page, 2);
        assert_eq!(stored[1].end_offset_ms, 6_000);
    }

    #[test]
    fn test_chunk_batch_rolls_back_on_mid_batch_failure() {
        let mut db = TranscriptDb::new_in_memory().unwrap();
        let id = db.create_document(&sample_document()).unwrap();

        // Second chunk reuses the first one's page, so its insert fails
        // after the first row has already gone in
        let mut chunks = sample_chunks();
        chunks[1].sequence_number = 1;

        assert!(db.create_chunks_batch(&id, &chunks).is_err());
        assert!(db.get_chunks_by_document(&id).unwrap().is_empty());
    }

    #[test]
    fn test_update_document_archives_and_retitles() {
        let db = TranscriptDb::new_in_memory().unwrap();
        let id = db.create_document(&sample_document()).unwrap();

        let changed = db
            .update_document(
                &id,
                &DocumentUpdate {
                    doc_title: Some("Revised Lecture".to_string()),
                    is_archived: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(changed);

        let doc = db.get_document(&id).unwrap().unwrap();
        assert_eq!(doc.doc_title.as_deref(), Some("Revised Lecture"));
        assert!(doc.is_archived);
        // Untouched fields keep their stored values
        assert_eq!(doc.doc_authors, vec!["A. Speaker"]);
        assert_eq!(doc.doc_keywords.len(), 2);

        let stats = db.get_document_stats(&id).unwrap().unwrap();
        assert!(stats.is_archived);
    }

    #[test]
    fn test_update_document_can_unarchive() {
        let db = TranscriptDb::new_in_memory().unwrap();
        let id = db.create_document(&sample_document()).unwrap();

        let archive = DocumentUpdate {
            is_archived: Some(true),
            ..Default::default()
        };
        db.update_document(&id, &archive).unwrap();

        let unarchive = DocumentUpdate {
            is_archived: Some(false),
            ..Default::default()
        };
        db.update_document(&id, &unarchive).unwrap();

        let doc = db.get_document(&id).unwrap().unwrap();
        assert!(!doc.is_archived);
    }

    #[test]
    fn test_update_missing_document_returns_false() {
        let db = TranscriptDb::new_in_memory().unwrap();
        let update = DocumentUpdate {
            is_archived: Some(true),
            ..Default::default()
        };
        assert!(!db.update_document("no-such-id", &update).unwrap());
    }

    #[test]
    fn test_document_stats_counts_chunks() {
        let mut db = TranscriptDb::new_in_memory().unwrap();
        let id = db.create_document(&sample_document()).unwrap();
        db.create_chunks_batch(&id, &sample_chunks()).unwrap();

        let stats = db.get_document_stats(&id).unwrap().unwrap();
        assert_eq!(stats.chunk_count, 2);
        assert_eq!(stats.name, "lecture.mp4");
        assert!(!stats.is_deleted);
    }

    #[test]
    fn test_soft_delete_keeps_rows() {
        let mut db = TranscriptDb::new_in_memory().unwrap();
        let id = db.create_document(&sample_document()).unwrap();
        db.create_chunks_batch(&id, &sample_chunks()).unwrap();

        assert!(db.delete_document(&id, true).unwrap());

        let doc = db.get_document(&id).unwrap().unwrap();
        assert!(doc.is_deleted);
        assert_eq!(db.get_chunks_by_document(&id).unwrap().len(), 2);
    }

    #[test]
    fn test_hard_delete_cascades_to_chunks() {
        let mut db = TranscriptDb::new_in_memory().unwrap();
        let id = db.create_document(&sample_document()).unwrap();
        db.create_chunks_batch(&id, &sample_chunks()).unwrap();

        assert!(db.delete_document(&id, false).unwrap());

        assert!(db.get_document(&id).unwrap().is_none());
        assert!(db.get_chunks_by_document(&id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_missing_document_returns_false() {
        let mut db = TranscriptDb::new_in_memory().unwrap();
        assert!(!db.delete_document("no-such-id", true).unwrap());
        assert!(!db.delete_document("no-such-id", false).unwrap());
    }

    #[test]
    fn test_document_from_media_hashes_file() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("talk.mp4");
        std::fs::write(&media, b"not really a video").unwrap();

        let fields = document_from_media(&media, None, vec![], vec![], None).unwrap();
        assert_eq!(fields.name, "talk.mp4");
        assert_eq!(fields.doc_title.as_deref(), Some("talk"));
        assert_eq!(fields.file_size, Some(18));
        assert_eq!(fields.sha_hash.as_ref().unwrap().len(), 64);
    }

    #[test]
    fn test_open_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcripts.db");

        let id = {
            let mut db = TranscriptDb::open(&path).unwrap();
            let id = db.create_document(&sample_document()).unwrap();
            db.create_chunks_batch(&id, &sample_chunks()).unwrap();
            id
        };

        let db = TranscriptDb::open(&path).unwrap();
        assert_eq!(db.get_chunks_by_document(&id).unwrap().len(), 2);
    }
}
