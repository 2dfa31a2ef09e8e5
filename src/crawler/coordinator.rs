//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the pagination loop that coordinates a crawl:
//! - Loading the dedup index from persisted history
//! - Walking listing pages newest to oldest, prefetching the next page
//! - Evaluating the stop condition per article before full extraction
//! - Assembling records on a bounded task pool
//! - Committing everything assembled, even when the crawl fails

use crate::config::Config;
use crate::crawler::assembler::{assemble, Assembled, AssemblyContext};
use crate::crawler::listing::{page_url, parse_listing, ListingPage};
use crate::crawler::progress::Progress;
use crate::crawler::visual::VisualResolver;
use crate::crawler::Fetcher;
use crate::output::dump_records;
use crate::state::{evaluate_stop, DedupIndex, StopDecision, StopReason};
use crate::storage::{Owner, Record, SqliteStorage, Storage};
use crate::{ArchiveError, ConfigError};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Immutable inputs of one crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Lower-cased profile id
    pub owner_id: String,

    /// Cursor of the page to start from; `None` starts at the newest page
    pub resume_cursor: Option<String>,

    /// Records at or before this instant end the crawl
    pub stop_before: Option<DateTime<Utc>>,

    /// Root directory for visuals and fallback dumps
    pub output_dir: PathBuf,
}

impl CrawlOptions {
    pub fn new(owner_id: &str, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            owner_id: owner_id.trim().to_lowercase(),
            resume_cursor: None,
            stop_before: None,
            output_dir: output_dir.into(),
        }
    }

    pub fn with_resume_cursor(mut self, cursor: Option<String>) -> Self {
        self.resume_cursor = cursor.filter(|c| !c.is_empty());
        self
    }

    pub fn with_stop_before(mut self, stop_before: Option<DateTime<Utc>>) -> Self {
        self.stop_before = stop_before;
        self
    }

    /// Directory holding this owner's canonical media files
    pub fn visuals_dir(&self) -> PathBuf {
        self.output_dir.join(format!("visuals_{}", self.owner_id))
    }
}

/// Outcome of a crawl
#[derive(Debug)]
pub struct CrawlResult {
    /// Records durably committed by this crawl
    pub records_written: usize,

    /// Cursor to resume from in a follow-up run
    pub last_cursor: Option<String>,
    pub stop_reason: StopReason,

    /// Non-fatal extraction warnings raised along the way
    pub warnings: usize,

    /// Records extracted against the expected total
    pub progress: Progress,

    /// The fatal error that ended the crawl, if any
    pub error: Option<ArchiveError>,
}

impl CrawlResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.stop_reason.is_clean()
    }
}

/// Main crawler coordinator structure
pub struct Coordinator<S: Storage = SqliteStorage> {
    storage: S,
    fetcher: Fetcher,
    base_url: Url,
    options: CrawlOptions,
    index: Arc<DedupIndex>,
    semaphore: Arc<Semaphore>,
    persisted_count: u64,
}

impl Coordinator<SqliteStorage> {
    /// Creates a coordinator backed by the configured SQLite database
    ///
    /// # Arguments
    ///
    /// * `config` - The archiver configuration
    /// * `options` - The crawl options
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(ArchiveError)` - Failed to initialize
    pub fn new(config: &Config, options: CrawlOptions) -> Result<Self, ArchiveError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        Self::with_storage(config, storage, options)
    }
}

impl<S: Storage> Coordinator<S> {
    /// Creates a coordinator over an already opened storage backend
    pub fn with_storage(
        config: &Config,
        mut storage: S,
        options: CrawlOptions,
    ) -> Result<Self, ArchiveError> {
        if options.owner_id.is_empty() {
            return Err(
                ConfigError::Validation("owner id must not be empty".to_string()).into(),
            );
        }

        let base_url = Url::parse(&config.crawler.base_url)
            .map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        let fetcher = Fetcher::new(&config.crawler)?;

        if storage.get_owner(&options.owner_id)?.is_none() {
            tracing::info!("First crawl of {}, creating owner", options.owner_id);
            storage.upsert_owner(&Owner::new(options.owner_id.as_str()))?;
        }

        let snapshot = storage.load_dedup_index(&options.owner_id)?;
        tracing::info!(
            "Loaded dedup index for {}: {} records, {} visual hashes",
            options.owner_id,
            snapshot.record_ids.len(),
            snapshot.hashes.len()
        );
        let persisted_count = storage.count_records(&options.owner_id)?;

        Ok(Self {
            storage,
            fetcher,
            base_url,
            options,
            index: Arc::new(DedupIndex::from_snapshot(snapshot)),
            semaphore: Arc::new(Semaphore::new(
                config.crawler.max_concurrent_articles.max(1) as usize,
            )),
            persisted_count,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Runs the pagination loop
    ///
    /// Fatal errors are carried in `CrawlResult::error`; records assembled
    /// before the failure are still committed.
    pub async fn run(&mut self) -> CrawlResult {
        let owner_id = self.options.owner_id.clone();
        let resolver = VisualResolver::new(
            self.fetcher.clone(),
            Arc::clone(&self.index),
            self.options.visuals_dir(),
        );

        let mut records: Vec<Record> = Vec::new();
        let mut warnings = 0;
        let mut cursor = self.options.resume_cursor.clone();
        let mut last_cursor = cursor.clone();

        tracing::info!(
            "Starting crawl of {} from {}",
            owner_id,
            cursor.as_deref().unwrap_or("the newest page")
        );

        let mut page = match self.fetch_listing(cursor.as_deref()).await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("Failed to fetch first page of {}: {}", owner_id, e);
                let result = CrawlResult {
                    records_written: 0,
                    last_cursor,
                    stop_reason: StopReason::Failed,
                    warnings,
                    progress: Progress::new(None),
                    error: Some(e),
                };
                return self.finish(records, None, result);
            }
        };

        let display_name = page.display_name.clone();
        let expected = page.expected_total.map(|total| {
            if self.persisted_count > 0 {
                total.abs_diff(self.persisted_count)
            } else {
                total
            }
        });
        if expected.is_none() {
            tracing::warn!(
                "Could not determine answer count for {}; reporting raw counts",
                owner_id
            );
        }
        let mut progress = Progress::new(expected);

        let (stop_reason, error) = loop {
            // Prefetch the next page while this one is assembled. Its body is
            // not looked at until this page's stop condition is settled.
            let mut prefetch = JoinSet::new();
            if let Some(next) = &page.next {
                let fetcher = self.fetcher.clone();
                let url = next.url.clone();
                prefetch.spawn(async move { fetcher.fetch_page(&url).await });
            }

            let ctx = Arc::new(AssemblyContext {
                owner_id: owner_id.clone(),
                page_id: cursor.clone(),
                base_url: self.base_url.clone(),
                resolver: resolver.clone(),
            });

            let mut tasks = JoinSet::new();
            let mut stop = None;
            for (position, article) in std::mem::take(&mut page.articles).into_iter().enumerate() {
                let unique = match article.unique {
                    Ok(unique) => unique,
                    Err(warning) => {
                        tracing::warn!(owner = %owner_id, "Skipping article {}: {}", position, warning);
                        warnings += 1;
                        continue;
                    }
                };

                if let StopDecision::Stop(reason) =
                    evaluate_stop(&unique, self.options.stop_before, &self.index)
                {
                    tracing::info!("Stopping at record {}: {}", unique.record_id, reason);
                    stop = Some(reason);
                    break;
                }
                self.index.insert_record(&unique.record_id);

                let ctx = Arc::clone(&ctx);
                let semaphore = Arc::clone(&self.semaphore);
                let html = article.html;
                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    (position, assemble(&html, unique, &ctx).await)
                });
            }

            let (mut assembled, task_error) = join_page(&mut tasks).await;
            assembled.sort_by_key(|(position, _)| *position);
            progress.record(assembled.len());
            for (_, Assembled { record, warnings: w }) in assembled {
                warnings += w.len();
                records.push(record);
            }
            tracing::debug!(
                "Page {} done, {} records so far",
                cursor.as_deref().unwrap_or("first"),
                progress.extracted()
            );

            if let Some(e) = task_error {
                break (StopReason::Failed, Some(e));
            }
            if let Some(reason) = stop {
                break (reason, None);
            }
            let Some(next) = page.next.take() else {
                tracing::info!("No next page link, reached end of history");
                break (StopReason::EndOfHistory, None);
            };

            last_cursor = Some(next.cursor.clone());
            let body = match prefetch.join_next().await {
                Some(Ok(Ok(body))) => body,
                Some(Ok(Err(e))) => {
                    tracing::error!("Failed to fetch page {}: {}", next.cursor, e);
                    break (StopReason::Failed, Some(e.into()));
                }
                Some(Err(e)) => break (StopReason::Failed, Some(ArchiveError::Task(e.to_string()))),
                None => {
                    break (
                        StopReason::Failed,
                        Some(ArchiveError::Task("prefetch task missing".to_string())),
                    )
                }
            };

            cursor = Some(next.cursor);
            page = parse_listing(&body, &self.base_url);
            progress.report();
        };

        progress.report();
        let result = CrawlResult {
            records_written: 0,
            last_cursor,
            stop_reason,
            warnings,
            progress,
            error,
        };
        self.finish(records, display_name, result)
    }

    async fn fetch_listing(&self, cursor: Option<&str>) -> Result<ListingPage, ArchiveError> {
        let url = page_url(&self.base_url, &self.options.owner_id, cursor)?;
        let body = self.fetcher.fetch_page(url.as_str()).await?;
        Ok(parse_listing(&body, &self.base_url))
    }

    /// Commits the assembled records and fills in what the commit made durable
    fn finish(
        &mut self,
        records: Vec<Record>,
        display_name: Option<String>,
        mut result: CrawlResult,
    ) -> CrawlResult {
        let owner_id = self.options.owner_id.clone();

        if records.is_empty() {
            if result.error.is_none() {
                self.update_owner(Owner::from_crawl(&owner_id, display_name, &records));
            }
        } else {
            if let Some(e) = &result.error {
                tracing::error!(
                    "Crawl failed: {}; committing {} assembled records",
                    e,
                    records.len()
                );
            }

            match self.storage.insert_records(&owner_id, &records) {
                Ok(count) => {
                    result.records_written = count;
                    if count < records.len() {
                        tracing::warn!(
                            "{} of {} records were already stored",
                            records.len() - count,
                            records.len()
                        );
                    }
                    self.update_owner(Owner::from_crawl(&owner_id, display_name, &records));
                }
                Err(e) => {
                    tracing::error!("Commit of {} records failed: {}", records.len(), e);
                    match dump_records(&self.options.output_dir, &owner_id, &records) {
                        Ok(path) => tracing::warn!("Records written to {}", path.display()),
                        Err(dump_err) => tracing::error!("Fallback dump failed: {}", dump_err),
                    }
                    if let Some(previous) = result.error.take() {
                        tracing::error!("Original crawl error: {}", previous);
                    }
                    result.error = Some(ArchiveError::Commit {
                        durable: 0,
                        attempted: records.len(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Crawl of {} finished ({}): {} records written, resume cursor {}",
            owner_id,
            result.stop_reason,
            result.records_written,
            result.last_cursor.as_deref().unwrap_or("<none>")
        );

        result
    }

    fn update_owner(&mut self, owner: Owner) {
        if let Err(e) = self.storage.upsert_owner(&owner) {
            tracing::warn!("Failed to update owner {}: {}", owner.owner_id, e);
        }
    }
}

/// Waits for every article task of a page
///
/// A panicked task is reported as a crawl error; the records that did finish
/// are still returned.
async fn join_page(
    tasks: &mut JoinSet<(usize, Assembled)>,
) -> (Vec<(usize, Assembled)>, Option<ArchiveError>) {
    let mut assembled = Vec::with_capacity(tasks.len());
    let mut error = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(item) => assembled.push(item),
            Err(e) => {
                tracing::error!("Article task failed: {}", e);
                error.get_or_insert(ArchiveError::Task(e.to_string()));
            }
        }
    }

    (assembled, error)
}

/// Runs the main crawl operation
///
/// # Arguments
///
/// * `config` - The archiver configuration
/// * `options` - Owner, resume cursor, stop-before boundary, and output directory
///
/// # Returns
///
/// * `Ok(CrawlResult)` - The crawl ran; check `CrawlResult::error` for a fatal failure
/// * `Err(ArchiveError)` - Storage or client initialization failed
///
/// # Example
///
/// ```no_run
/// use qa_archiver::config::load_config_or_default;
/// use qa_archiver::crawler::{run_crawl, CrawlOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config_or_default(None)?;
/// let result = run_crawl(&config, CrawlOptions::new("alice", "output")).await?;
/// println!("{} records written", result.records_written);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: &Config, options: CrawlOptions) -> Result<CrawlResult, ArchiveError> {
    let mut coordinator = Coordinator::new(config, options)?;
    Ok(coordinator.run().await)
}
