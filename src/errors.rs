//! Error handling module
//!
//! Structured error types for attribute access and result rendering.
//! Binary decode failures never show up here: the decoder degrades them to
//! a fallback string instead.

use thiserror::Error;

/// Main error type for search result processing
#[derive(Error, Debug)]
pub enum SearchError {
    /// Reading a single attribute's value failed
    #[error("{0}")]
    AttributeAccess(String),

    /// Writing to the output destination failed
    #[error("Output failed: {0}")]
    Output(#[from] std::io::Error),

    /// Structured document serialization failed
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input handed over by the directory client
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for SearchError {
    fn from(err: anyhow::Error) -> Self {
        SearchError::Internal(err.to_string())
    }
}

/// Result type alias for search result processing
pub type Result<T> = std::result::Result<T, SearchError>;
