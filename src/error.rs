//! Error types shared by the classification ports and their bindings.

use thiserror::Error;

/// A classification signal could not be produced.
///
/// The decision engine treats every variant as a neutral contribution.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("signal unavailable: {0}")]
    Unavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

impl SignalError {
    /// Level for a per-message failure. Unavailable signals are reported once
    /// at start-up, so per message they stay at debug.
    pub fn log_level(&self) -> log::Level {
        match self {
            SignalError::Unavailable(_) => log::Level::Debug,
            SignalError::Inference(_) => log::Level::Warn,
        }
    }
}

/// The persisted model artifact could not be loaded.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse model artifact: {0}")]
    Json(#[from] serde_json::Error),

    #[error("inconsistent model artifact: {0}")]
    Shape(String),
}

/// The known-spam corpus could not be turned into a similarity index.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read spam corpus: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse spam corpus: {0}")]
    Csv(#[from] csv::Error),

    #[error("spam corpus contains no spam messages")]
    Empty,

    #[error("no vectorizer available for the spam corpus")]
    NoVectorizer,
}

/// Folder state could not be persisted or restored.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
