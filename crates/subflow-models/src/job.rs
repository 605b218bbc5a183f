//! Job definitions and lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of transformation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Transcode incompatible audio to AAC, keeping video/subtitle streams
    Convert,
    /// Stream-copy into an MP4 container
    Remux,
    /// Synchronize a subtitle file against a video's audio track
    Sync,
    /// Translate a subtitle file
    Translate,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Convert => "convert",
            JobKind::Remux => "remux",
            JobKind::Sync => "sync",
            JobKind::Translate => "translate",
        }
    }

    /// Parse a kind from its wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "convert" => Some(JobKind::Convert),
            "remux" => Some(JobKind::Remux),
            "sync" => Some(JobKind::Sync),
            "translate" => Some(JobKind::Translate),
            _ => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job document persisted, no worker has picked it up yet
    #[default]
    Starting,
    /// A worker is actively executing the job
    Processing,
    /// Job finished successfully, output artifact available
    Completed,
    /// Job failed, error recorded on the document
    Error,
    /// Cancellation was observed and the job stopped
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a status from its wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "starting" => Some(JobStatus::Starting),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "error" => Some(JobStatus::Error),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no more transitions permitted).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Error | JobStatus::Cancelled
        )
    }

    /// Check whether transitioning to `next` is a valid edge of the
    /// lifecycle graph. Terminal states reject everything.
    pub fn can_transition(&self, next: JobStatus) -> bool {
        match self {
            JobStatus::Starting => {
                matches!(next, JobStatus::Processing | JobStatus::Cancelled)
            }
            JobStatus::Processing => matches!(
                next,
                JobStatus::Completed | JobStatus::Error | JobStatus::Cancelled
            ),
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advisory progress snapshot. Percentage is monotonically non-decreasing
/// within a single run; the flush layer enforces the high-water mark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    /// 0-100
    pub percentage: u8,
    /// Human-readable message for display
    pub message: String,
    /// Current stage name (e.g. "transcoding", "batch 2/5")
    pub stage: String,
}

impl JobProgress {
    pub fn new(percentage: u8, message: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            percentage: percentage.min(100),
            message: message.into(),
            stage: stage.into(),
        }
    }
}

/// Machine-checkable error classification recorded on failed jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    /// Bad kind or unsupported input; rejected at creation
    Validation,
    /// Transcoder/transcriber subprocess failed
    ExternalTool,
    /// Translation engine unreachable or erroring after retries
    TranslationService,
    /// Unknown job id
    NotFound,
    /// Write attempted against a terminal job
    IllegalTransition,
    /// Everything else
    Internal,
}

impl JobErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobErrorKind::Validation => "validation",
            JobErrorKind::ExternalTool => "external_tool",
            JobErrorKind::TranslationService => "translation_service",
            JobErrorKind::NotFound => "not_found",
            JobErrorKind::IllegalTransition => "illegal_transition",
            JobErrorKind::Internal => "internal",
        }
    }
}

/// Terminal error recorded on a job document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    /// Human-readable cause
    pub message: String,
    /// Machine tag so clients can distinguish retryable from bad-input cases
    pub kind: JobErrorKind,
}

impl JobError {
    pub fn new(kind: JobErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

/// A tracked unit of asynchronous work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID, immutable after creation
    pub id: JobId,

    /// Job kind
    pub kind: JobKind,

    /// Lifecycle status
    #[serde(default)]
    pub status: JobStatus,

    /// Advisory progress
    #[serde(default)]
    pub progress: JobProgress,

    /// Reference to the source artifact
    pub input_ref: String,

    /// Reference to the result artifact; set iff status == completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,

    /// Terminal error; set iff status == error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,

    /// Cancellation intent, distinct from final status. Set by cancel(),
    /// observed cooperatively by the worker at its flush cadence.
    #[serde(default)]
    pub cancel_requested: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp, bumped on every field mutation
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job document in the `starting` state.
    pub fn new(kind: JobKind, input_ref: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            kind,
            status: JobStatus::Starting,
            progress: JobProgress::new(0, "Job created", "starting"),
            input_ref: input_ref.into(),
            output_ref: None,
            error: None,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Partial-field merge document. Only present fields are written; applying
/// an update never clears fields it does not mention.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_requested: Option<bool>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn progress(progress: JobProgress) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Progress update that also keeps the job marked as processing.
    pub fn processing(progress: JobProgress) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Terminal success: output reference plus completed status and a
    /// final 100% progress mark.
    pub fn completed(output_ref: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(JobProgress::new(100, "Done", "completed")),
            output_ref: Some(output_ref.into()),
            ..Default::default()
        }
    }

    /// Terminal failure with a recorded cause.
    pub fn failed(error: JobError) -> Self {
        Self {
            status: Some(JobStatus::Error),
            error: Some(error),
            ..Default::default()
        }
    }

    /// Terminal cancellation.
    pub fn cancelled() -> Self {
        Self {
            status: Some(JobStatus::Cancelled),
            ..Default::default()
        }
    }

    /// Apply this merge onto a job document. Only present fields change;
    /// `updated_at` always bumps.
    pub fn apply(&self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(ref progress) = self.progress {
            job.progress = progress.clone();
        }
        if let Some(ref output_ref) = self.output_ref {
            job.output_ref = Some(output_ref.clone());
        }
        if let Some(ref error) = self.error {
            job.error = Some(error.clone());
        }
        if let Some(cancel_requested) = self.cancel_requested {
            job.cancel_requested = cancel_requested;
        }
        job.updated_at = Utc::now();
    }
}
