//! Statistics generation from the archive database
//!
//! This module provides functionality for extracting and displaying
//! per-owner archive statistics from the storage layer.

use crate::output::traits::OutputResult;
use crate::storage::{ExportMark, Owner, Storage, StorageError};

/// Archive statistics for one owner
#[derive(Debug, Clone)]
pub struct ArchiveStatistics {
    pub owner: Owner,

    /// Total number of archived records
    pub records: u64,

    /// Records carrying a visual
    pub visuals: u64,

    /// Progress of the Markdown export, if it ever ran
    pub export_mark: Option<ExportMark>,
}

impl ArchiveStatistics {
    /// Share of records with a visual, as a percentage
    pub fn visual_rate(&self) -> f64 {
        if self.records == 0 {
            return 0.0;
        }
        (self.visuals as f64 / self.records as f64) * 100.0
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `owner_id` - Owner to report on
///
/// # Returns
///
/// * `Ok(ArchiveStatistics)` - Successfully loaded statistics
/// * `Err(OutputError)` - Unknown owner or failed query
pub fn load_statistics(storage: &dyn Storage, owner_id: &str) -> OutputResult<ArchiveStatistics> {
    let owner = storage
        .get_owner(owner_id)?
        .ok_or_else(|| StorageError::OwnerNotFound(owner_id.to_string()))?;

    Ok(ArchiveStatistics {
        owner,
        records: storage.count_records(owner_id)?,
        visuals: storage.count_visuals(owner_id)?,
        export_mark: storage.get_export_mark(owner_id)?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &ArchiveStatistics) {
    let fmt_date = |ts: Option<chrono::DateTime<chrono::Utc>>| {
        ts.map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    println!("=== Archive Statistics: {} ===\n", stats.owner.owner_id);

    println!("Overview:");
    if let Some(name) = &stats.owner.display_name {
        println!("  Display name: {}", name);
    }
    println!("  Records archived: {}", stats.records);
    println!(
        "  Records with visuals: {} ({:.1}%)",
        stats.visuals,
        stats.visual_rate()
    );
    println!("  Oldest record: {}", fmt_date(stats.owner.first_record_at));
    println!("  Newest record: {}", fmt_date(stats.owner.last_record_at));
    println!();

    match &stats.export_mark {
        Some(mark) => println!(
            "Markdown export: up to record {} ({})",
            mark.record_id,
            mark.exported_until.format("%Y-%m-%d %H:%M")
        ),
        None => println!("Markdown export: never run"),
    }
}
