//! Worker error type and its mapping onto job error records.

use thiserror::Error;

use subflow_media::MediaError;
use subflow_models::{JobError, JobErrorKind};
use subflow_store::StoreError;
use subflow_translate::TranslateError;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur while executing a job.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("Cancellation observed")]
    Cancelled,

    #[error("Not enough usable audio samples: got {got}, need {need}")]
    InsufficientSamples { got: usize, need: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl WorkerError {
    /// Whether this error is the cooperative-cancellation signal rather
    /// than a genuine failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            WorkerError::Cancelled
                | WorkerError::Media(MediaError::Cancelled)
                | WorkerError::Translate(TranslateError::Cancelled)
        )
    }

    /// The error record written onto the job document.
    pub fn to_job_error(&self) -> JobError {
        let kind = match self {
            WorkerError::Media(_) | WorkerError::InsufficientSamples { .. } => {
                JobErrorKind::ExternalTool
            }
            WorkerError::Translate(_) => JobErrorKind::TranslationService,
            WorkerError::InvalidInput(_) => JobErrorKind::Validation,
            WorkerError::Store(_) | WorkerError::Io(_) | WorkerError::Cancelled => {
                JobErrorKind::Internal
            }
        };
        JobError::new(kind, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        let e = WorkerError::Media(MediaError::ffmpeg_failed("boom", None, Some(1)));
        assert_eq!(e.to_job_error().kind, JobErrorKind::ExternalTool);

        let e = WorkerError::Translate(TranslateError::EmptyResponse);
        assert_eq!(e.to_job_error().kind, JobErrorKind::TranslationService);

        let e = WorkerError::InsufficientSamples { got: 1, need: 3 };
        assert_eq!(e.to_job_error().kind, JobErrorKind::ExternalTool);
    }

    #[test]
    fn test_cancellation_detection() {
        assert!(WorkerError::Media(MediaError::Cancelled).is_cancellation());
        assert!(WorkerError::Translate(TranslateError::Cancelled).is_cancellation());
        assert!(!WorkerError::Media(MediaError::FfmpegNotFound).is_cancellation());
    }
}
