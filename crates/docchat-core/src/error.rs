use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration for '{field}': {reason}")]
    Config { field: String, reason: String },

    #[error("Connection to {service} failed: {message}")]
    Connection { service: String, message: String },

    #[error("No documents matching '{pattern}' under {}", .dir.display())]
    EmptyCorpus { dir: PathBuf, pattern: String },

    #[error("Failed to load {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    #[error("Embedding provider {provider} failed{}: {message}", status_suffix(.status))]
    Provider { provider: String, status: Option<u16>, message: String },

    #[error("Generation with {model} failed{}: {message}", status_suffix(.status))]
    Generation { model: String, status: Option<u16>, message: String },

    #[error("Retrieval from collection '{collection}' failed: {message}")]
    Retrieval { collection: String, message: String },

    #[error("Write to collection '{collection}' failed: {message}")]
    Store { collection: String, message: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout { operation: String, after: Duration },

    #[error("{operation} was cancelled")]
    Cancelled { operation: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl Error {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config { field: field.into(), reason: reason.into() }
    }

    /// Errors that must abort startup instead of being reported per turn.
    pub fn is_setup_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Connection { .. } | Self::DimensionMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
