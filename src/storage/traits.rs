//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::DedupSnapshot;
use crate::storage::{ExportMark, Owner, Record};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Owner not found: {0}")]
    OwnerNotFound(String),

    #[error("Corrupt row for record {record_id}: {message}")]
    CorruptRow { record_id: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines every persistence operation the crawler and the
/// exporters need. The crawl treats these as plain boundary calls; durability
/// is the backend's concern.
pub trait Storage {
    // ===== Owner Management =====

    /// Gets an owner by id
    fn get_owner(&self, owner_id: &str) -> StorageResult<Option<Owner>>;

    /// Creates or updates an owner
    ///
    /// `display_name` and `last_record_at` replace stored values when present.
    /// `first_record_at` is only written while the stored value is still unset.
    fn upsert_owner(&mut self, owner: &Owner) -> StorageResult<()>;

    // ===== Record Management =====

    /// Checks whether a record id has already been archived for this owner
    fn record_exists(&self, owner_id: &str, record_id: &str) -> StorageResult<bool>;

    /// Inserts records in a single transaction
    ///
    /// Records whose id is already stored are skipped; stored records are never
    /// rewritten.
    ///
    /// # Returns
    ///
    /// The number of records that were newly written
    fn insert_records(&mut self, owner_id: &str, records: &[Record]) -> StorageResult<usize>;

    /// Counts archived records for an owner
    fn count_records(&self, owner_id: &str) -> StorageResult<u64>;

    /// Counts archived records carrying a visual
    fn count_visuals(&self, owner_id: &str) -> StorageResult<u64>;

    /// Loads records strictly newer than `after`, oldest first
    fn load_records_after(
        &self,
        owner_id: &str,
        after: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<Record>>;

    // ===== Duplicate Detection =====

    /// Loads every known record id and the earliest record per content hash
    fn load_dedup_index(&self, owner_id: &str) -> StorageResult<DedupSnapshot>;

    // ===== Export Marks =====

    /// Gets how far the Markdown export has progressed
    fn get_export_mark(&self, owner_id: &str) -> StorageResult<Option<ExportMark>>;

    /// Records the last exported record
    fn set_export_mark(&mut self, mark: &ExportMark) -> StorageResult<()>;
}
