//! State module for tracking crawl progress
//!
//! This module holds the per-crawl state shared between the crawl controller
//! and the article tasks.
//!
//! # Components
//!
//! - `DedupIndex`: known record ids and canonical media hashes, rebuilt per crawl
//! - `StopReason`: why the pagination loop ended
//! - `evaluate_stop`: the per-article stop-condition check

mod dedup_index;
mod stop;

// Re-export main types
pub use dedup_index::{CanonicalVisual, DedupIndex, DedupSnapshot, HashClaim};
pub use stop::{evaluate_stop, StopDecision, StopReason};
