//! Crawl progress reporting

use std::fmt;

/// Tracks extracted records against the expected total
#[derive(Debug, Clone, Copy, Default)]
pub struct Progress {
    expected: Option<u64>,
    extracted: u64,
}

impl Progress {
    /// Creates a tracker; a zero or unknown total disables percentages
    pub fn new(expected: Option<u64>) -> Self {
        Self {
            expected: expected.filter(|total| *total > 0),
            extracted: 0,
        }
    }

    /// Adds newly extracted records
    pub fn record(&mut self, count: usize) {
        self.extracted += count as u64;
    }

    pub fn extracted(&self) -> u64 {
        self.extracted
    }

    /// Percentage of the expected total, capped at 100
    pub fn percent_complete(&self) -> Option<f64> {
        self.expected
            .map(|total| (self.extracted as f64 / total as f64 * 100.0).min(100.0))
    }

    /// Logs the current progress
    pub fn report(&self) {
        tracing::info!("Progress: {}", self);
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percent_complete() {
            Some(percent) => write!(f, "{:.2}% ({} records)", percent, self.extracted),
            None => write!(f, "{} records", self.extracted),
        }
    }
}
