//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the archive database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Archived profiles
CREATE TABLE IF NOT EXISTS owners (
    owner_id TEXT PRIMARY KEY,
    display_name TEXT,
    first_record_at TEXT,
    last_record_at TEXT
);

-- One row per archived question/answer
CREATE TABLE IF NOT EXISTS records (
    owner_id TEXT NOT NULL REFERENCES owners(owner_id) ON DELETE CASCADE,
    record_id TEXT NOT NULL,
    thread_id TEXT NOT NULL,
    page_id TEXT,
    question_text TEXT NOT NULL,
    answer_text TEXT NOT NULL,
    author_id TEXT,
    author_name TEXT,
    timestamp TEXT NOT NULL,
    likes INTEGER NOT NULL DEFAULT 0,
    visual_kind TEXT,
    visual_id TEXT,
    visual_url TEXT,
    visual_ext TEXT,
    content_hash TEXT,
    PRIMARY KEY (owner_id, record_id)
);

CREATE INDEX IF NOT EXISTS idx_records_timestamp ON records(owner_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_records_hash ON records(owner_id, content_hash);
CREATE INDEX IF NOT EXISTS idx_records_thread ON records(owner_id, thread_id);

-- How far the Markdown export has progressed per owner
CREATE TABLE IF NOT EXISTS export_marks (
    owner_id TEXT PRIMARY KEY REFERENCES owners(owner_id) ON DELETE CASCADE,
    record_id TEXT NOT NULL,
    exported_until TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
