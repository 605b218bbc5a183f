//! Durable, cross-instance job persistence and lifecycle management.
//!
//! This crate provides:
//! - The `JobStore` trait: shared key-value persistence with partial-field
//!   merge updates (a progress write never clobbers `output_ref` or `error`)
//! - `RedisJobStore`: one Redis hash per job, readable from any instance
//! - `MemoryJobStore`: in-process store for tests and single-node use
//! - `JobManager`: owns the state machine; creation, cancellation and
//!   transition-guarded writes

pub mod error;
pub mod manager;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use manager::JobManager;
pub use store::{JobStore, MemoryJobStore, RedisJobStore, RedisStoreConfig};
