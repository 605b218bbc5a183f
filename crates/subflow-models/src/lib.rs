//! Shared data models for the subflow backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their lifecycle status and progress
//! - Partial-field merge updates against the job store
//! - Subtitle entries and SRT parsing/generation

pub mod job;
pub mod subtitle;

pub use job::{
    Job, JobError, JobErrorKind, JobId, JobKind, JobProgress, JobStatus, JobUpdate,
};
pub use subtitle::{generate_srt, parse_srt, SubtitleEntry};
