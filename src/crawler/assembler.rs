//! Record assembler
//!
//! Turns one article into one `Record`. Concurrency is per article: the
//! controller runs one `assemble` task per article on a bounded pool. Inside a
//! task the field extractors are pure and run one after another over a single
//! parse of the article, each yielding its own `FieldResult`. The visual
//! download is the only suspension point.

use crate::crawler::extract::{extract_article, ExtractionWarning, FieldResult, UniqueInfo};
use crate::crawler::visual::VisualResolver;
use crate::storage::Record;
use url::Url;

/// Per-page context shared by every article task on that page
#[derive(Debug, Clone)]
pub struct AssemblyContext {
    pub owner_id: String,

    /// Cursor of the page being assembled; `None` for the newest page
    pub page_id: Option<String>,
    pub base_url: Url,
    pub resolver: VisualResolver,
}

/// An assembled record plus the warnings raised while extracting it
#[derive(Debug, Clone)]
pub struct Assembled {
    pub record: Record,
    pub warnings: Vec<ExtractionWarning>,
}

/// Assembles a record from an article's markup
///
/// Missing fields fall back to their zero value; the record is always produced.
pub async fn assemble(article_html: &str, unique: UniqueInfo, ctx: &AssemblyContext) -> Assembled {
    let fields = extract_article(article_html, &ctx.base_url);
    let mut warnings = Vec::new();

    let thread_id = settle(&mut warnings, ctx, &unique, fields.thread_id)
        .flatten()
        .unwrap_or_else(|| unique.record_id.clone());
    let question = settle(&mut warnings, ctx, &unique, fields.question).unwrap_or_default();
    let answer_text = settle(&mut warnings, ctx, &unique, fields.answer).unwrap_or_default();
    let likes = settle(&mut warnings, ctx, &unique, fields.likes).unwrap_or_default();
    let candidate = settle(&mut warnings, ctx, &unique, fields.visual).flatten();

    let visual = match candidate {
        Some(candidate) => {
            ctx.resolver
                .resolve(&candidate, &ctx.owner_id, &unique.record_id)
                .await
        }
        None => None,
    };

    Assembled {
        record: Record {
            owner_id: ctx.owner_id.clone(),
            record_id: unique.record_id,
            thread_id,
            page_id: ctx.page_id.clone(),
            question_text: question.text,
            answer_text,
            author_id: question.author_id,
            author_name: question.author_name,
            timestamp: unique.timestamp,
            likes,
            visual,
        },
        warnings,
    }
}

/// Unwraps a field result, logging and collecting the warning on failure
fn settle<T>(
    warnings: &mut Vec<ExtractionWarning>,
    ctx: &AssemblyContext,
    unique: &UniqueInfo,
    result: FieldResult<T>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(warning) => {
            tracing::warn!(
                owner = %ctx.owner_id,
                record = %unique.record_id,
                "Extraction warning: {}",
                warning
            );
            warnings.push(warning);
            None
        }
    }
}
