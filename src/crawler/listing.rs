//! Listing page parser
//!
//! A profile's answers are listed newest first, a page at a time. Each page
//! links to the next (older) one through an `?older=<cursor>` link.

use crate::crawler::extract::{element_text, extract_unique_info, select_first, FieldResult, UniqueInfo};
use scraper::{Html, Selector};
use url::Url;

/// Query parameter carrying the pagination cursor
pub const CURSOR_PARAM: &str = "older";

/// One article on a listing page
///
/// Only the cheap unique info is extracted up front; the article's markup is
/// kept so the full extraction can run later in its own task.
#[derive(Debug, Clone)]
pub struct ArticleSource {
    pub html: String,
    pub unique: FieldResult<UniqueInfo>,
}

/// Link to the next (older) listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPage {
    pub url: String,
    pub cursor: String,
}

/// Everything the controller needs from one listing page
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Record articles in listing order; photo polls are already skipped
    pub articles: Vec<ArticleSource>,
    pub next: Option<NextPage>,

    /// Total answer count shown on the profile, when it could be parsed
    pub expected_total: Option<u64>,
    pub display_name: Option<String>,
}

/// Builds the URL of an owner's listing page
///
/// `cursor` is `None` for the newest page.
pub fn page_url(base_url: &Url, owner_id: &str, cursor: Option<&str>) -> Result<Url, url::ParseError> {
    let mut url = base_url.join(owner_id)?;
    if let Some(cursor) = cursor {
        url.query_pairs_mut().append_pair(CURSOR_PARAM, cursor);
    }
    Ok(url)
}

/// Parses a listing page body
///
/// # Arguments
///
/// * `body` - The page HTML
/// * `base_url` - Site root used to resolve the next-page link
pub fn parse_listing(body: &str, base_url: &Url) -> ListingPage {
    let document = Html::parse_document(body);

    ListingPage {
        articles: extract_articles(&document),
        next: extract_next_page(&document, base_url),
        expected_total: extract_expected_total(&document),
        display_name: extract_display_name(&document),
    }
}

fn extract_articles(document: &Html) -> Vec<ArticleSource> {
    let Ok(selector) = Selector::parse("div.item-page article") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|article| select_first(*article, "div.streamItem_visual.photopoll").is_none())
        .map(|article| ArticleSource {
            html: article.html(),
            unique: extract_unique_info(article),
        })
        .collect()
}

fn extract_next_page(document: &Html, base_url: &Url) -> Option<NextPage> {
    let selector = Selector::parse("a.item-page-next[href]").ok()?;
    let href = document.select(&selector).next()?.value().attr("href")?;

    let url = match base_url.join(href) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Ignoring malformed next-page link {}: {}", href, e);
            return None;
        }
    };

    let cursor = url
        .query_pairs()
        .find(|(key, _)| key == CURSOR_PARAM)
        .map(|(_, value)| value.into_owned())
        .or_else(|| href.rsplit('=').next().map(str::to_string))
        .filter(|cursor| !cursor.is_empty() && cursor != href)?;

    Some(NextPage {
        url: url.to_string(),
        cursor,
    })
}

/// The answer count sits in the stats block's `title`, e.g. "1,234 answers"
fn extract_expected_total(document: &Html) -> Option<u64> {
    let selector = Selector::parse("div.profileStats_number.profileTabAnswerCount").ok()?;
    let node = document.select(&selector).next()?;

    let raw = node
        .value()
        .attr("title")
        .map(str::to_string)
        .unwrap_or_else(|| element_text(node));
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn extract_display_name(document: &Html) -> Option<String> {
    let selector = Selector::parse("div.userName_status").ok()?;
    let status = document.select(&selector).next()?;

    let name = select_first(status, "span")
        .map(element_text)
        .unwrap_or_else(|| element_text(status));
    Some(name).filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://ask.fm/").unwrap()
    }

    fn article(id: &str, ts: &str) -> String {
        format!(
            r#"<article class="streamItem streamItem-answer">
                 <header class="streamItem_header"><h2>q{id}</h2></header>
                 <div class="streamItem_content">a{id}</div>
                 <a class="streamItem_meta" href="/alice/answers/{id}" title="t"><time datetime="{ts}">x</time></a>
               </article>"#
        )
    }

    #[test]
    fn test_page_url() {
        let first = page_url(&base(), "alice", None).unwrap();
        assert_eq!(first.as_str(), "https://ask.fm/alice");

        let older = page_url(&base(), "alice", Some("1620000000")).unwrap();
        assert_eq!(older.as_str(), "https://ask.fm/alice?older=1620000000");
    }

    #[test]
    fn test_parse_listing() {
        let body = format!(
            r#"<html><body>
                 <div class="userName_status"><span>Alice A.</span><span class="status">hi</span></div>
                 <div class="profileStats_number profileTabAnswerCount" title="1,234 answers">1.2K</div>
                 <div class="item-page">
                   {}
                   <article class="streamItem"><div class="streamItem_visual photopoll"></div></article>
                   {}
                 </div>
                 <a class="item-page-next" href="/alice?older=cursor2">More</a>
               </body></html>"#,
            article("2", "2021-01-02T00:00:00"),
            article("1", "2021-01-01T00:00:00"),
        );

        let page = parse_listing(&body, &base());

        assert_eq!(page.articles.len(), 2);
        let first = page.articles[0].unique.as_ref().unwrap();
        assert_eq!(first.record_id, "2");
        assert!(page.articles[0].html.contains("a2"));

        assert_eq!(
            page.next,
            Some(NextPage {
                url: "https://ask.fm/alice?older=cursor2".to_string(),
                cursor: "cursor2".to_string(),
            })
        );
        assert_eq!(page.expected_total, Some(1234));
        assert_eq!(page.display_name.as_deref(), Some("Alice A."));
    }

    #[test]
    fn test_last_page_has_no_next() {
        let body = format!(
            r#"<div class="item-page">{}</div>"#,
            article("1", "2021-01-01T00:00:00")
        );
        let page = parse_listing(&body, &base());

        assert_eq!(page.articles.len(), 1);
        assert_eq!(page.next, None);
        assert_eq!(page.expected_total, None);
        assert_eq!(page.display_name, None);
    }

    #[test]
    fn test_unparseable_count_is_none() {
        let body = r#"<div class="profileStats_number profileTabAnswerCount" title="many">?</div>"#;
        assert_eq!(parse_listing(body, &base()).expected_total, None);
    }
}
