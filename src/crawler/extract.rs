//! Field extractors for a single listing article
//!
//! Every extractor is a pure function over the article sub-tree and returns an
//! explicit `FieldResult`. A missing or malformed field is reported as an
//! `ExtractionWarning`; the assembler substitutes the field's zero value and
//! moves on.

use crate::crawler::visual::VisualCandidate;
use crate::storage::{VisualKind, LINK_CLOSE, LINK_OPEN};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;
use url::Url;

/// Timestamp format used by the listing's `<time datetime>` attributes
const SITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A non-fatal problem found while extracting one field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionWarning {
    #[error("{field}: no element matches `{selector}`")]
    MissingMarkup {
        field: &'static str,
        selector: &'static str,
    },

    #[error("{field}: {detail}")]
    Malformed { field: &'static str, detail: String },
}

impl ExtractionWarning {
    /// Name of the field the warning belongs to
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingMarkup { field, .. } | Self::Malformed { field, .. } => field,
        }
    }
}

/// Result of a single field extractor
pub type FieldResult<T> = Result<T, ExtractionWarning>;

/// The minimal per-article data needed to evaluate the stop condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueInfo {
    pub record_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Question text plus its (optional) author
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionFields {
    pub text: String,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
}

/// Everything extracted from one article, field by field
#[derive(Debug, Clone)]
pub struct ArticleFields {
    /// `None` when the article does not belong to a longer thread
    pub thread_id: FieldResult<Option<String>>,
    pub question: FieldResult<QuestionFields>,
    pub answer: FieldResult<String>,
    pub likes: FieldResult<u32>,
    pub visual: FieldResult<Option<VisualCandidate>>,
}

/// Parses an article's outer HTML and runs every field extractor over it
///
/// The parsed tree never leaves this function, so callers can hold the result
/// across await points.
pub fn extract_article(article_html: &str, base_url: &Url) -> ArticleFields {
    let fragment = Html::parse_fragment(article_html);
    let article = Selector::parse("article")
        .ok()
        .and_then(|selector| fragment.select(&selector).next())
        .unwrap_or_else(|| fragment.root_element());

    ArticleFields {
        thread_id: extract_thread_id(article),
        question: extract_question(article),
        answer: extract_answer(article),
        likes: extract_likes(article),
        visual: extract_visual(article, base_url),
    }
}

/// Extracts the record id and timestamp from the article's permalink
pub fn extract_unique_info(article: ElementRef<'_>) -> FieldResult<UniqueInfo> {
    const FIELD: &str = "unique info";
    const SELECTOR: &str = "a.streamItem_meta[href]";

    let link = select_first(article, SELECTOR)
        .filter(|link| link.value().attr("href").is_some_and(|h| !h.trim().is_empty()))
        .ok_or(ExtractionWarning::MissingMarkup {
            field: FIELD,
            selector: SELECTOR,
        })?;

    let record_id = link
        .value()
        .attr("href")
        .and_then(last_path_segment)
        .ok_or_else(|| ExtractionWarning::Malformed {
            field: FIELD,
            detail: "permalink has no record id".to_string(),
        })?;

    let datetime = select_first(link, "time[datetime]")
        .and_then(|time| time.value().attr("datetime"))
        .ok_or(ExtractionWarning::MissingMarkup {
            field: FIELD,
            selector: "time[datetime]",
        })?;

    let timestamp = parse_timestamp(datetime).ok_or_else(|| ExtractionWarning::Malformed {
        field: FIELD,
        detail: format!("unparseable timestamp `{}`", datetime),
    })?;

    Ok(UniqueInfo {
        record_id,
        timestamp,
    })
}

/// Parses a listing timestamp
///
/// The site emits naive UTC timestamps; RFC 3339 values are accepted as well.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, SITE_TIMESTAMP_FORMAT) {
        return Some(Utc.from_utc_datetime(&naive));
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Extracts the id of the record that started this article's thread
///
/// Returns `Ok(None)` when the article has no thread link, i.e. it starts its
/// own thread.
pub fn extract_thread_id(article: ElementRef<'_>) -> FieldResult<Option<String>> {
    let Some(link) = select_first(article, "a.streamItem_threadDetails.keep-asking") else {
        return Ok(None);
    };

    link.value()
        .attr("href")
        .and_then(last_path_segment)
        .map(Some)
        .ok_or_else(|| ExtractionWarning::Malformed {
            field: "thread",
            detail: "thread link has no record id".to_string(),
        })
}

/// Extracts the question text and its author
pub fn extract_question(article: ElementRef<'_>) -> FieldResult<QuestionFields> {
    const SELECTOR: &str = "header.streamItem_header";

    let header = select_first(article, SELECTOR).ok_or(ExtractionWarning::MissingMarkup {
        field: "question",
        selector: SELECTOR,
    })?;

    let heading = select_first(header, "h2").ok_or(ExtractionWarning::MissingMarkup {
        field: "question",
        selector: "header.streamItem_header h2",
    })?;

    let (author_id, author_name) = match select_first(header, "a.author") {
        Some(author) => {
            let id = author
                .value()
                .attr("href")
                .map(|href| href.trim().trim_matches('/').to_string())
                .filter(|id| !id.is_empty());
            let name = Some(element_text(author)).filter(|name| !name.is_empty());
            (id, name)
        }
        None => (None, None),
    };

    Ok(QuestionFields {
        text: render_rich_text(heading),
        author_id,
        author_name,
    })
}

/// Extracts the answer text
///
/// Right-to-left answers are wrapped in an extra `<span>`, which is unwrapped.
pub fn extract_answer(article: ElementRef<'_>) -> FieldResult<String> {
    let container = select_first(article, "div.streamItem_content")
        .or_else(|| select_first(article, "div.asnwerCard_text"))
        .ok_or(ExtractionWarning::MissingMarkup {
            field: "answer",
            selector: "div.streamItem_content",
        })?;

    let first_child = container
        .children()
        .find(|child| !matches!(child.value(), Node::Text(text) if text.trim().is_empty()));
    let content = match first_child.and_then(ElementRef::wrap) {
        Some(span) if span.value().name() == "span" => span,
        _ => container,
    };

    Ok(render_rich_text(content))
}

/// Extracts the like counter; an empty counter means zero likes
pub fn extract_likes(article: ElementRef<'_>) -> FieldResult<u32> {
    const SELECTOR: &str = "div.heartButton a.counter";

    let counter = select_first(article, SELECTOR).ok_or(ExtractionWarning::MissingMarkup {
        field: "likes",
        selector: SELECTOR,
    })?;

    let digits: String = element_text(counter)
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return Ok(0);
    }

    digits.parse().map_err(|e| ExtractionWarning::Malformed {
        field: "likes",
        detail: format!("counter `{}`: {}", digits, e),
    })
}

/// Classifies the article's visual and extracts its source URL
///
/// Returns `Ok(None)` when the article has no visual at all.
pub fn extract_visual(
    article: ElementRef<'_>,
    base_url: &Url,
) -> FieldResult<Option<VisualCandidate>> {
    const FIELD: &str = "visual";

    let Some(visual) = select_first(article, "div.streamItem_visual") else {
        return Ok(None);
    };

    let (kind, source) = if let Some(video) = select_first(visual, "div.rsp-eql-desktop") {
        let src = video
            .children()
            .find_map(ElementRef::wrap)
            .and_then(|player| player.value().attr("src"));
        (VisualKind::Video, src)
    } else {
        let link = select_first(visual, "a").ok_or(ExtractionWarning::MissingMarkup {
            field: FIELD,
            selector: "div.streamItem_visual a",
        })?;
        let is_gif = link
            .value()
            .attr("data-action")
            .is_some_and(|action| action.contains("Gif"));
        let (kind, attr) = if is_gif {
            (VisualKind::Gif, "data-src")
        } else {
            (VisualKind::Image, "src")
        };
        let src = link
            .children()
            .find_map(ElementRef::wrap)
            .and_then(|media| media.value().attr(attr));
        (kind, src)
    };

    let source = source
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .ok_or_else(|| ExtractionWarning::Malformed {
            field: FIELD,
            detail: format!("{} has no source url", kind.to_db_string()),
        })?;

    let source_url = base_url
        .join(source)
        .map_err(|e| ExtractionWarning::Malformed {
            field: FIELD,
            detail: format!("invalid source url `{}`: {}", source, e),
        })?;

    Ok(Some(VisualCandidate {
        kind,
        source_url: source_url.to_string(),
    }))
}

/// Flattens mixed rich-text markup into marker-annotated plain text
///
/// Text nodes are kept verbatim, anchors are wrapped in link markers, `<br>`
/// becomes a newline and `<hr>` a paragraph break. Any other element
/// contributes its text content.
pub fn render_rich_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                match el.name() {
                    "a" => {
                        out.push_str(LINK_OPEN);
                        out.push_str(&child.text().collect::<String>());
                        out.push_str(LINK_CLOSE);
                    }
                    "br" => out.push('\n'),
                    "hr" => out.push_str("\n\n"),
                    _ => out.push_str(&child.text().collect::<String>()),
                }
            }
            _ => {}
        }
    }

    out.trim().to_string()
}

/// Returns the first descendant matching a CSS selector
pub(crate) fn select_first<'a>(element: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    element.select(&selector).next()
}

/// Collected, trimmed text content of an element
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Last non-empty path segment of an href, ignoring any query string
fn last_path_segment(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .map(str::trim)
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}
