/// Stop conditions for the newest-to-oldest pagination walk
use crate::crawler::UniqueInfo;
use crate::state::DedupIndex;
use chrono::{DateTime, Utc};
use std::fmt;

/// Why a crawl stopped walking pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// A record at or before the stop-before boundary was reached
    Boundary,

    /// A record that is already archived was reached
    KnownRecord,

    /// The last listing page had no "next page" link
    EndOfHistory,

    /// A page fetch or another fatal error ended the crawl
    Failed,
}

impl StopReason {
    /// Returns true if the crawl ended without a fatal error
    pub fn is_clean(&self) -> bool {
        !matches!(self, Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boundary => "reached stop-before boundary",
            Self::KnownRecord => "reached already archived record",
            Self::EndOfHistory => "reached end of history",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of checking one article against the stop conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    Continue,
    Stop(StopReason),
}

/// Checks an article's id and timestamp before paying for full extraction
///
/// An already-known id stops the crawl even when the timestamp is still after
/// the boundary. That case is logged on its own since, with id-based cursors,
/// it should only happen when a resumed crawl re-reads an ingested page.
pub fn evaluate_stop(
    unique: &UniqueInfo,
    stop_before: Option<DateTime<Utc>>,
    index: &DedupIndex,
) -> StopDecision {
    let at_boundary = stop_before.is_some_and(|boundary| unique.timestamp <= boundary);

    if index.record_exists(&unique.record_id) {
        if !at_boundary {
            tracing::warn!(
                record = %unique.record_id,
                timestamp = %unique.timestamp,
                "Record id already archived although it is newer than the boundary; stopping"
            );
        }
        return StopDecision::Stop(StopReason::KnownRecord);
    }

    if at_boundary {
        return StopDecision::Stop(StopReason::Boundary);
    }

    StopDecision::Continue
}
