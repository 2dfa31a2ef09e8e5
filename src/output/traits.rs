//! Output error types and the exportable payload
//!
//! Everything written to the output directory goes through `ExportPayload`,
//! which knows how to render itself and which extension it uses.

use crate::storage::{Record, StorageError};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Content that can be saved to the output directory
#[derive(Debug, Clone, Copy)]
pub enum ExportPayload<'a> {
    /// Records serialized as pretty-printed JSON
    Records(&'a [Record]),

    /// Markdown blocks, one per line group
    Markdown(&'a [String]),
}

impl ExportPayload<'_> {
    /// File extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Records(_) => "json",
            Self::Markdown(_) => "md",
        }
    }

    /// Renders the payload to the exact file contents
    pub fn render(&self) -> OutputResult<String> {
        match self {
            Self::Records(records) => Ok(serde_json::to_string_pretty(records)?),
            Self::Markdown(lines) => {
                let mut out = String::new();
                for line in lines.iter() {
                    out.push_str(line);
                    out.push('\n');
                }
                Ok(out)
            }
        }
    }
}
