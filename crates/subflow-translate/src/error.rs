//! Error types for the translation pipeline.

use thiserror::Error;

/// Result type for translation operations.
pub type TranslateResult<T> = Result<T, TranslateError>;

/// Errors that can occur during translation.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("Translation API key not configured")]
    MissingApiKey,

    #[error("Translation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Translation service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Translation service returned no content")]
    EmptyResponse,

    #[error("Batch {batch} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        batch: usize,
        attempts: u32,
        #[source]
        source: Box<TranslateError>,
    },

    #[error("Output count {actual} does not match input count {expected}")]
    Parity { expected: usize, actual: usize },

    #[error("Translation cancelled")]
    Cancelled,
}
