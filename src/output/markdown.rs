//! Markdown export generation
//!
//! This module renders archived records as Markdown with inline HTML, split
//! into numbered files, plus an info header per owner. Only records newer than
//! the owner's export mark are rendered, oldest first.

use crate::output::files::save_payload;
use crate::output::traits::{ExportPayload, OutputResult};
use crate::storage::{ExportMark, Record, Storage, StorageError, VisualKind, LINK_CLOSE, LINK_OPEN};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Records per generated Markdown file
pub const RECORDS_PER_FILE: usize = 5000;

/// Spacing between fields of a record's info line
const INFO_SPACING: &str = "&emsp;&emsp;";

/// What a Markdown export produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownReport {
    pub records_exported: usize,

    /// Numbered record files, excluding the info header
    pub files: Vec<PathBuf>,
}

/// Generates the Markdown export for an owner
///
/// # Arguments
///
/// * `storage` - The storage backend holding the archive
/// * `owner_id` - Owner to export
/// * `output_dir` - Directory the files are written to
/// * `base_url` - Site root used for permalinks and `@name` links
///
/// # Returns
///
/// * `Ok(MarkdownReport)` - Export finished; empty when there was nothing new
/// * `Err(OutputError)` - Storage or file error
pub fn generate_markdown(
    storage: &mut dyn Storage,
    owner_id: &str,
    output_dir: &Path,
    base_url: &str,
) -> OutputResult<MarkdownReport> {
    let owner = storage
        .get_owner(owner_id)?
        .ok_or_else(|| StorageError::OwnerNotFound(owner_id.to_string()))?;

    let after = storage.get_export_mark(owner_id)?.map(|m| m.exported_until);
    let records = storage.load_records_after(owner_id, after)?;

    let Some(last) = records.last() else {
        tracing::info!("Nothing to export for {}", owner_id);
        return Ok(MarkdownReport::default());
    };

    let thread_counts = count_threads(&records);
    let mut files = Vec::new();
    for (index, chunk) in records.chunks(RECORDS_PER_FILE).enumerate() {
        let blocks: Vec<String> = chunk
            .iter()
            .map(|record| {
                let siblings = thread_counts
                    .get(record.thread_id.as_str())
                    .map_or(0, |count| count - 1);
                format_record(record, siblings, base_url)
            })
            .collect();

        let stem = format!("{}_{:03}", owner_id, index);
        files.push(save_payload(output_dir, &stem, ExportPayload::Markdown(&blocks))?);
    }

    let header = format_header(
        owner.display_name.as_deref().unwrap_or(owner_id),
        owner.first_record_at,
        owner.last_record_at,
        storage.count_records(owner_id)?,
        storage.count_visuals(owner_id)?,
    );
    save_payload(
        output_dir,
        &format!("info_{}", owner_id),
        ExportPayload::Markdown(&[header]),
    )?;

    storage.set_export_mark(&ExportMark {
        owner_id: owner_id.to_string(),
        record_id: last.record_id.clone(),
        exported_until: last.timestamp,
    })?;

    tracing::info!(
        "Exported {} records of {} into {} files",
        records.len(),
        owner_id,
        files.len()
    );

    Ok(MarkdownReport {
        records_exported: records.len(),
        files,
    })
}

/// Number of exported records per thread id
fn count_threads(records: &[Record]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for record in records {
        *counts.entry(record.thread_id.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Renders one record as a Markdown block
///
/// `thread_siblings` is the number of other exported records in the same thread.
pub fn format_record(record: &Record, thread_siblings: usize, base_url: &str) -> String {
    let mut block = String::new();
    block.push_str(&format_question(&record.question_text, base_url));
    block.push_str(&format_answer(&record.answer_text, base_url));
    block.push('\n');
    block.push('\n');
    if let Some(visual) = format_visual(record, base_url) {
        block.push_str(&visual);
    }
    block.push_str(&format_info(record, thread_siblings, base_url));
    block.push_str("***\n");
    block
}

pub fn format_question(text: &str, base_url: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let body = format_text(text, base_url);
    if is_rtl(text) {
        format!("<pre style=\"text-align: right\">{}</pre>\n", body)
    } else {
        format!("<pre>{}</pre>\n", body)
    }
}

pub fn format_answer(text: &str, base_url: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let body = format_text(text, base_url);
    if is_rtl(text) {
        format!("<div align=\"right\" class=\"answer\">{}</div>\n", body)
    } else {
        format!("<div class=\"answer\">{}</div>\n", body)
    }
}

/// Resolves link markers, turns newlines into `<br>`, and wraps RTL text
fn format_text(text: &str, base_url: &str) -> String {
    let linked = format_links(text, base_url).replace('\n', "<br>");
    if is_rtl(text) {
        format!("<span dir=\"rtl\">{}</span>", linked)
    } else {
        linked
    }
}

/// Replaces `<link>alias</link>` markers with anchors
///
/// `@name` aliases point at that profile; anything else is used as the target.
pub fn format_links(text: &str, base_url: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(LINK_OPEN) {
        let after_open = &rest[start + LINK_OPEN.len()..];
        let Some(end) = after_open.find(LINK_CLOSE) else {
            break;
        };

        let alias = &after_open[..end];
        let target = match alias.strip_prefix('@') {
            Some(name) => format!("{}{}", base_url, name),
            None => alias.to_string(),
        };

        out.push_str(&rest[..start]);
        out.push_str(&format!(
            "<a target=\"_blank\" href=\"{}\">{}</a>",
            target, alias
        ));
        rest = &after_open[end + LINK_CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

/// Images are embedded from the visuals folder; gifs and videos are linked
fn format_visual(record: &Record, base_url: &str) -> Option<String> {
    let visual = record.visual.as_ref()?;

    let rendered = match visual.kind {
        VisualKind::Image => format!(
            "![MISSING: Visuals Folder](visuals_{}/{})",
            record.owner_id,
            visual.file_name()
        ),
        kind => {
            let url = if visual.source_url.is_empty() {
                permalink(record, base_url)
            } else {
                visual.source_url.clone()
            };
            let label = match kind {
                VisualKind::Gif => "GIF",
                _ => "VIDEO",
            };
            format!("<a target=\"_blank\" href=\"{}\">Visual: {}</a>", url, label)
        }
    };

    Some(format!("{}\n\n", rendered))
}

fn format_info(record: &Record, thread_siblings: usize, base_url: &str) -> String {
    let mut info = format!(
        "<a target=\"_blank\" href=\"{}\">{}</a>{}",
        permalink(record, base_url),
        record.timestamp.format("%Y-%m-%d %H:%M"),
        INFO_SPACING
    );
    info.push_str(&format!("Likes: {}{}", record.likes, INFO_SPACING));
    info.push_str(&format!("ThreadCount: {}  {}", thread_siblings, INFO_SPACING));

    if let Some(author) = record.author_id.as_deref().filter(|a| !a.is_empty()) {
        info.push_str(&format!(
            "Question By: <a target=\"_blank\" href=\"{}{}\">{}</a>",
            base_url, author, author
        ));
    }

    info.push('\n');
    info
}

fn permalink(record: &Record, base_url: &str) -> String {
    format!("{}{}/answers/{}", base_url, record.owner_id, record.record_id)
}

/// Renders the per-owner info header
pub fn format_header(
    display_name: &str,
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
    record_count: u64,
    visual_count: u64,
) -> String {
    let date = |ts: Option<DateTime<Utc>>| {
        ts.map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    };

    let mut header = String::new();
    header.push_str(&format!("# {} Archive\n", display_name));
    header.push_str("## File Details:\n");
    header.push_str(&format!("First Question Date: {}\n\n", date(first)));
    header.push_str(&format!("Last Question Date: {}\n\n", date(last)));
    header.push_str(&format!("Number of Questions: {}\n\n", record_count));
    header.push_str(&format!("Number of Visuals: {}\n\n", visual_count));
    header.push_str("---");
    header
}

/// True when the text contains Arabic-script codepoints
pub fn is_rtl(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}')
    })
}
