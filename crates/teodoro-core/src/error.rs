//! Error types for the Teodoro core
//!
//! The first five variants are the dispatch taxonomy. Everything else is plumbing that the
//! dispatcher folds into one of them at its boundary.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while loading, matching or dispatching a command
#[derive(Error, Debug)]
pub enum CoreError {
    /// No trigger matched the transcript.
    #[error("Unrecognized intent for transcript '{0}'")]
    UnrecognizedIntent(String),

    /// An anchor word or a table lookup was missing.
    #[error("Extraction failure: {0}")]
    ExtractionFailure(String),

    /// The session lacks a feature the intent requires.
    #[error("Authorization denied for {intent}: missing {missing}")]
    AuthDenied { intent: String, missing: String },

    /// An external collaborator failed while executing a handler.
    #[error("Handler failure in {handler}: {reason}")]
    HandlerFailure { handler: String, reason: String },

    /// Required lexicon data is absent. Nothing can be dispatched.
    #[error("Fatal configuration error: {0}")]
    FatalConfig(String),

    #[error("Store error: {0}")]
    Store(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Seed file error: {0}")]
    Seed(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Dispatcher is shutting down")]
    ShuttingDown,
}

impl CoreError {
    pub fn extraction(reason: impl Into<String>) -> Self {
        CoreError::ExtractionFailure(reason.into())
    }

    pub fn handler(handler: impl Into<String>, reason: impl ToString) -> Self {
        CoreError::HandlerFailure {
            handler: handler.into(),
            reason: reason.to_string(),
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        CoreError::FatalConfig(reason.into())
    }

    /// Collaborator-side failures: network, process, timeouts. The dispatcher downgrades
    /// these to a user-facing message instead of propagating them.
    pub fn is_handler_failure(&self) -> bool {
        matches!(
            self,
            CoreError::HandlerFailure { .. }
                | CoreError::Http(_)
                | CoreError::Io(_)
                | CoreError::Timeout(_)
        )
    }
}
