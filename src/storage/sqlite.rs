//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{CanonicalVisual, DedupSnapshot};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ExportMark, Owner, Record, VisualKind, VisualRef};
use crate::ArchiveError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RECORD_COLUMNS: &str = "owner_id, record_id, thread_id, page_id, question_text, answer_text,
     author_id, author_name, timestamp, likes, visual_kind, visual_id, visual_url, visual_ext,
     content_hash";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(ArchiveError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, ArchiveError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, ArchiveError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Timestamps are stored as fixed-width RFC 3339 text so they sort lexically
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_timestamp(idx: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(idx, &v)).transpose()
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    let timestamp: String = row.get(8)?;
    let visual_kind: Option<String> = row.get(10)?;
    let visual_id: Option<String> = row.get(11)?;
    let visual_url: Option<String> = row.get(12)?;
    let visual_ext: Option<String> = row.get(13)?;
    let content_hash: Option<String> = row.get(14)?;

    let visual = match (visual_kind, visual_id, visual_url, visual_ext, content_hash) {
        (Some(kind), Some(visual_id), Some(source_url), Some(extension), Some(content_hash)) => {
            VisualKind::from_db_string(&kind).map(|kind| VisualRef {
                kind,
                visual_id,
                source_url,
                extension,
                content_hash,
            })
        }
        _ => None,
    };

    Ok(Record {
        owner_id: row.get(0)?,
        record_id: row.get(1)?,
        thread_id: row.get(2)?,
        page_id: row.get(3)?,
        question_text: row.get(4)?,
        answer_text: row.get(5)?,
        author_id: row.get(6)?,
        author_name: row.get(7)?,
        timestamp: parse_timestamp(8, &timestamp)?,
        likes: row.get(9)?,
        visual,
    })
}

impl Storage for SqliteStorage {
    // ===== Owner Management =====

    fn get_owner(&self, owner_id: &str) -> StorageResult<Option<Owner>> {
        let owner = self
            .conn
            .query_row(
                "SELECT owner_id, display_name, first_record_at, last_record_at
                 FROM owners WHERE owner_id = ?1",
                params![owner_id],
                |row| {
                    Ok(Owner {
                        owner_id: row.get(0)?,
                        display_name: row.get(1)?,
                        first_record_at: parse_optional_timestamp(2, row.get(2)?)?,
                        last_record_at: parse_optional_timestamp(3, row.get(3)?)?,
                    })
                },
            )
            .optional()?;

        Ok(owner)
    }

    fn upsert_owner(&mut self, owner: &Owner) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO owners (owner_id, display_name, first_record_at, last_record_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(owner_id) DO UPDATE SET
                display_name = COALESCE(excluded.display_name, owners.display_name),
                first_record_at = COALESCE(owners.first_record_at, excluded.first_record_at),
                last_record_at = CASE
                    WHEN owners.last_record_at IS NULL THEN excluded.last_record_at
                    WHEN excluded.last_record_at IS NULL THEN owners.last_record_at
                    WHEN excluded.last_record_at > owners.last_record_at THEN excluded.last_record_at
                    ELSE owners.last_record_at
                END",
            params![
                owner.owner_id,
                owner.display_name,
                owner.first_record_at.as_ref().map(format_timestamp),
                owner.last_record_at.as_ref().map(format_timestamp),
            ],
        )?;
        Ok(())
    }

    // ===== Record Management =====

    fn record_exists(&self, owner_id: &str, record_id: &str) -> StorageResult<bool> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM records WHERE owner_id = ?1 AND record_id = ?2",
                params![owner_id, record_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    fn insert_records(&mut self, owner_id: &str, records: &[Record]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;

        // Records reference their owner
        tx.execute(
            "INSERT OR IGNORE INTO owners (owner_id) VALUES (?1)",
            params![owner_id],
        )?;

        let mut written = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO records ({}) VALUES
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                RECORD_COLUMNS
            ))?;

            for record in records {
                let visual = record.visual.as_ref();
                written += stmt.execute(params![
                    owner_id,
                    record.record_id,
                    record.thread_id,
                    record.page_id,
                    record.question_text,
                    record.answer_text,
                    record.author_id,
                    record.author_name,
                    format_timestamp(&record.timestamp),
                    record.likes,
                    visual.map(|v| v.kind.to_db_string()),
                    visual.map(|v| v.visual_id.as_str()),
                    visual.map(|v| v.source_url.as_str()),
                    visual.map(|v| v.extension.as_str()),
                    visual.map(|v| v.content_hash.as_str()),
                ])?;
            }
        }

        tx.commit()?;
        Ok(written)
    }

    fn count_records(&self, owner_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE owner_id = ?1",
            params![owner_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_visuals(&self, owner_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE owner_id = ?1 AND visual_id IS NOT NULL",
            params![owner_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn load_records_after(
        &self,
        owner_id: &str,
        after: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM records
             WHERE owner_id = ?1 AND (?2 IS NULL OR timestamp > ?2)
             ORDER BY timestamp ASC, record_id ASC",
            RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map(
                params![owner_id, after.as_ref().map(format_timestamp)],
                record_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    // ===== Duplicate Detection =====

    fn load_dedup_index(&self, owner_id: &str) -> StorageResult<DedupSnapshot> {
        let mut snapshot = DedupSnapshot::default();

        let mut stmt = self
            .conn
            .prepare("SELECT record_id FROM records WHERE owner_id = ?1")?;
        let ids = stmt.query_map(params![owner_id], |row| row.get::<_, String>(0))?;
        for id in ids {
            snapshot.record_ids.insert(id?);
        }

        // Oldest first so the earliest record claims each hash
        let mut stmt = self.conn.prepare(
            "SELECT content_hash, record_id, visual_id, visual_ext FROM records
             WHERE owner_id = ?1 AND content_hash IS NOT NULL AND visual_id IS NOT NULL
             ORDER BY timestamp ASC, record_id ASC",
        )?;
        let rows = stmt.query_map(params![owner_id], |row| {
            Ok(CanonicalVisual {
                content_hash: row.get(0)?,
                record_id: row.get(1)?,
                visual_id: row.get(2)?,
                extension: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        })?;
        for canonical in rows {
            let canonical = canonical?;
            snapshot
                .hashes
                .entry(canonical.content_hash.clone())
                .or_insert(canonical);
        }

        Ok(snapshot)
    }

    // ===== Export Marks =====

    fn get_export_mark(&self, owner_id: &str) -> StorageResult<Option<ExportMark>> {
        let mark = self
            .conn
            .query_row(
                "SELECT owner_id, record_id, exported_until FROM export_marks WHERE owner_id = ?1",
                params![owner_id],
                |row| {
                    let until: String = row.get(2)?;
                    Ok(ExportMark {
                        owner_id: row.get(0)?,
                        record_id: row.get(1)?,
                        exported_until: parse_timestamp(2, &until)?,
                    })
                },
            )
            .optional()?;
        Ok(mark)
    }

    fn set_export_mark(&mut self, mark: &ExportMark) -> StorageResult<()> {
        let updated = self.conn.execute(
            "INSERT INTO export_marks (owner_id, record_id, exported_until)
             SELECT ?1, ?2, ?3 WHERE EXISTS (SELECT 1 FROM owners WHERE owner_id = ?1)
             ON CONFLICT(owner_id) DO UPDATE SET
                record_id = excluded.record_id,
                exported_until = excluded.exported_until",
            params![
                mark.owner_id,
                mark.record_id,
                format_timestamp(&mark.exported_until)
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::OwnerNotFound(mark.owner_id.clone()));
        }
        Ok(())
    }
}
