//! Error taxonomy for the annotation pipeline.
//!
//! Every variant except the configuration ones (`MissingModel`, `Runtime`) is
//! recovered locally: the batch driver skips the file, the annotator nulls
//! the task.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotateError {
    /// File unreadable, corrupt or in an unsupported codec
    #[error("failed to load {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// Encoder rejected the waveform
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// A classifier head call errored
    #[error("classifier head `{head}` failed: {reason}")]
    Head { head: String, reason: String },

    /// Descriptor computation failed
    #[error("descriptor `{0}` failed: {1}")]
    Descriptor(String, String),

    #[error("model file not found: {0:?}")]
    MissingModel(PathBuf),

    /// Inference runtime unavailable or failed to build a session
    #[error("inference runtime: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnnotateError {
    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn head(head: impl Into<String>, reason: impl ToString) -> Self {
        Self::Head {
            head: head.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors detected while constructing a task rather than while
    /// processing a file.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingModel(_) | Self::Runtime(_))
    }
}

pub type Result<T> = std::result::Result<T, AnnotateError>;
