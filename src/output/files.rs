//! Writing payloads to the output directory

use crate::output::traits::{ExportPayload, OutputError, OutputResult};
use crate::storage::Record;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Saves a payload as `<dir>/<stem>.<ext>`, creating `dir` when needed
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the written file
/// * `Err(OutputError)` - Rendering or writing failed
pub fn save_payload(dir: &Path, stem: &str, payload: ExportPayload<'_>) -> OutputResult<PathBuf> {
    if stem.is_empty() {
        return Err(OutputError::Write("empty file name".to_string()));
    }

    let contents = payload.render()?;
    fs::create_dir_all(dir)?;

    let path = dir.join(format!("{}.{}", stem, payload.extension()));
    let mut file = File::create(&path)?;
    file.write_all(contents.as_bytes())?;

    Ok(path)
}

/// Dumps records that could not be committed to a JSON file
///
/// The file is named after the owner and the oldest record's timestamp,
/// e.g. `alice_210304_0506.json`.
pub fn dump_records(output_dir: &Path, owner_id: &str, records: &[Record]) -> OutputResult<PathBuf> {
    let suffix = records
        .iter()
        .map(|r| r.timestamp)
        .min()
        .map(|ts| ts.format("%y%m%d_%H%M").to_string())
        .unwrap_or_else(|| "empty".to_string());

    save_payload(
        output_dir,
        &format!("{}_{}", owner_id, suffix),
        ExportPayload::Records(records),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn record(id: &str, minute: u32) -> Record {
        Record {
            owner_id: "alice".to_string(),
            record_id: id.to_string(),
            thread_id: id.to_string(),
            page_id: None,
            question_text: format!("q{}", id),
            answer_text: format!("a{}", id),
            author_id: None,
            author_name: None,
            timestamp: Utc.with_ymd_and_hms(2021, 3, 4, 5, minute, 0).unwrap(),
            likes: 0,
            visual: None,
        }
    }

    #[test]
    fn test_dump_records_round_trips() {
        let dir = TempDir::new().unwrap();
        let records = vec![record("2", 10), record("1", 6)];

        let path = dump_records(dir.path(), "alice", &records).unwrap();
        assert_eq!(path.file_name().unwrap(), "alice_210304_0506.json");

        let contents = fs::read_to_string(&path).unwrap();
        let parsed: Vec<Record> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn test_save_payload_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let lines = vec!["x".to_string()];

        let path = save_payload(&nested, "info_alice", ExportPayload::Markdown(&lines)).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "x\n");
    }

    #[test]
    fn test_save_payload_rejects_empty_stem() {
        let dir = TempDir::new().unwrap();
        let result = save_payload(dir.path(), "", ExportPayload::Records(&[]));
        assert!(matches!(result, Err(OutputError::Write(_))));
    }
}
