//! Storage module for persisting archived records
//!
//! This module handles all database operations for the archiver, including:
//! - SQLite database initialization and schema management
//! - Owner profile bookkeeping
//! - Record persistence and lookup
//! - Loading the duplicate-detection snapshot at crawl start
//! - Export progress marks for the Markdown generator

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::ArchiveError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Opening marker of an inline link inside question/answer text
pub const LINK_OPEN: &str = "<link>";

/// Closing marker of an inline link inside question/answer text
pub const LINK_CLOSE: &str = "</link>";

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(ArchiveError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, ArchiveError> {
    SqliteStorage::new(path)
}

/// One archived question/answer unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub owner_id: String,
    pub record_id: String,

    /// Id of the record that started this thread (its own id for thread roots)
    pub thread_id: String,

    /// Cursor of the listing page the record was found on; `None` for the first page
    pub page_id: Option<String>,

    pub question_text: String,
    pub answer_text: String,

    /// Absent for anonymous questions
    pub author_id: Option<String>,
    pub author_name: Option<String>,

    pub timestamp: DateTime<Utc>,
    pub likes: u32,
    pub visual: Option<VisualRef>,
}

/// Media attached to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualRef {
    pub kind: VisualKind,

    /// Id the media file is stored under; another record's id when deduplicated
    pub visual_id: String,
    pub source_url: String,
    pub extension: String,
    pub content_hash: String,
}

impl VisualRef {
    /// File name of the stored media inside the owner's visuals directory
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.visual_id, self.extension)
    }
}

/// Kind of media attached to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisualKind {
    Image,
    Gif,
    Video,
}

impl VisualKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Gif => "gif",
            Self::Video => "video",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "gif" => Some(Self::Gif),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    /// Extension used when the source URL does not carry one
    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Image => "jpg",
            Self::Gif => "gif",
            Self::Video => "mp4",
        }
    }
}

/// Profile-level aggregate for an archived owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub owner_id: String,
    pub display_name: Option<String>,

    /// Oldest record ever archived; written once
    pub first_record_at: Option<DateTime<Utc>>,

    /// Newest record archived so far
    pub last_record_at: Option<DateTime<Utc>>,
}

impl Owner {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            display_name: None,
            first_record_at: None,
            last_record_at: None,
        }
    }

    /// Builds the update produced by one crawl
    ///
    /// The storage upsert keeps an existing `first_record_at`, so passing the
    /// crawl's oldest timestamp here only matters for a brand-new owner.
    pub fn from_crawl(owner_id: &str, display_name: Option<String>, records: &[Record]) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            display_name,
            first_record_at: records.iter().map(|r| r.timestamp).min(),
            last_record_at: records.iter().map(|r| r.timestamp).max(),
        }
    }
}

/// Progress of the Markdown export for one owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportMark {
    pub owner_id: String,

    /// Last record included in an export
    pub record_id: String,
    pub exported_until: DateTime<Utc>,
}
