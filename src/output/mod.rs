//! Output module for exports and reports
//!
//! This module handles:
//! - Generating the Markdown export of an owner's archive
//! - Dumping records to JSON when they cannot be committed
//! - Displaying archive statistics

mod files;
mod markdown;
pub mod stats;
mod traits;

pub use files::{dump_records, save_payload};
pub use markdown::{
    format_answer, format_header, format_links, format_question, format_record, generate_markdown,
    is_rtl, MarkdownReport, RECORDS_PER_FILE,
};
pub use stats::{load_statistics, print_statistics, ArchiveStatistics};
pub use traits::{ExportPayload, OutputError, OutputResult};
