//! Crawler module for walking a profile's answer history
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching of listing pages and media
//! - Listing page parsing and per-field extraction
//! - Visual download and content-hash deduplication
//! - Record assembly on a bounded task pool
//! - Overall crawl coordination

mod assembler;
mod coordinator;
mod extract;
mod fetcher;
mod listing;
mod progress;
mod visual;

pub use assembler::{assemble, Assembled, AssemblyContext};
pub use coordinator::{run_crawl, Coordinator, CrawlOptions, CrawlResult};
pub use extract::{
    extract_answer, extract_article, extract_likes, extract_question, extract_thread_id,
    extract_unique_info, extract_visual, parse_timestamp, render_rich_text, ArticleFields,
    ExtractionWarning, FieldResult, QuestionFields, UniqueInfo,
};
pub use fetcher::{build_http_client, Fetcher};
pub use listing::{page_url, parse_listing, ArticleSource, ListingPage, NextPage, CURSOR_PARAM};
pub use progress::Progress;
pub use visual::{content_hash, VisualCandidate, VisualResolver};
