//! Lifecycle coordination over the job store.

use std::sync::Arc;

use tracing::{info, warn};

use subflow_models::{Job, JobId, JobKind, JobStatus, JobUpdate};

use crate::error::{StoreError, StoreResult};
use crate::store::JobStore;

/// Coordinates job lifecycle against the store: creation, status-guarded
/// updates, and cancellation intent.
///
/// All status writes go through [`JobManager::update_job`], which enforces
/// the lifecycle graph. Writes against a terminal job are rejected with
/// [`StoreError::IllegalTransition`], so a cancel landing after completion
/// can never flip the outcome.
#[derive(Clone)]
pub struct JobManager {
    store: Arc<dyn JobStore>,
}

impl JobManager {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    /// Validate the kind and persist a new job in the `starting` state.
    pub async fn create_job(&self, kind: &str, input_ref: impl Into<String>) -> StoreResult<Job> {
        let kind = JobKind::parse(kind)
            .ok_or_else(|| StoreError::validation(format!("unknown job kind '{}'", kind)))?;

        let job = Job::new(kind, input_ref);
        self.store.create(&job).await?;
        Ok(job)
    }

    pub async fn get_job(&self, id: &JobId) -> StoreResult<Job> {
        self.store.get(id).await
    }

    /// Merge an update into the job document, enforcing the lifecycle graph.
    ///
    /// Re-asserting the current status (a `processing` job flushing progress
    /// with `status: processing`) is permitted; only genuine transitions are
    /// checked against the graph.
    pub async fn update_job(&self, id: &JobId, update: &JobUpdate) -> StoreResult<Job> {
        let current = self.store.get(id).await?;

        if current.status.is_terminal() {
            return Err(StoreError::IllegalTransition {
                id: id.to_string(),
                from: current.status,
                to: update.status.unwrap_or(current.status),
            });
        }

        if let Some(next) = update.status {
            if next != current.status && !current.status.can_transition(next) {
                return Err(StoreError::IllegalTransition {
                    id: id.to_string(),
                    from: current.status,
                    to: next,
                });
            }
        }

        self.store.update(id, update).await?;

        if let Some(next) = update.status {
            if next != current.status {
                info!(job_id = %id, from = %current.status, to = %next, "Job status transition");
            }
        }

        self.store.get(id).await
    }

    /// Record cancellation intent on a running job.
    ///
    /// The worker observes the flag cooperatively at its next flush and
    /// performs the actual `cancelled` transition itself. Cancelling a
    /// terminal job is an illegal transition.
    pub async fn cancel_job(&self, id: &JobId) -> StoreResult<Job> {
        let current = self.store.get(id).await?;

        if current.status.is_terminal() {
            return Err(StoreError::IllegalTransition {
                id: id.to_string(),
                from: current.status,
                to: JobStatus::Cancelled,
            });
        }

        let update = JobUpdate {
            cancel_requested: Some(true),
            ..Default::default()
        };
        self.store.update(id, &update).await?;
        info!(job_id = %id, status = %current.status, "Cancellation requested");

        self.store.get(id).await
    }

    /// Delete all jobs whose last update is older than `age`. Returns the
    /// number of jobs removed.
    pub async fn purge_older_than(&self, age: chrono::Duration) -> StoreResult<usize> {
        let cutoff = chrono::Utc::now() - age;
        let mut purged = 0;
        for job in self.store.list().await? {
            if job.updated_at < cutoff {
                if let Err(e) = self.store.delete(&job.id).await {
                    warn!(job_id = %job.id, error = %e, "Failed to purge stale job");
                    continue;
                }
                purged += 1;
            }
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryJobStore;
    use subflow_models::{JobError, JobErrorKind, JobProgress};

    fn manager() -> JobManager {
        JobManager::new(Arc::new(MemoryJobStore::new()))
    }

    #[tokio::test]
    async fn test_create_validates_kind() {
        let mgr = manager();
        let job = mgr.create_job("convert", "in.mkv").await.unwrap();
        assert_eq!(job.kind, JobKind::Convert);
        assert_eq!(job.status, JobStatus::Starting);

        assert!(matches!(
            mgr.create_job("transmogrify", "in.mkv").await,
            Err(StoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_happy_path_lifecycle() {
        let mgr = manager();
        let job = mgr.create_job("remux", "in.mkv").await.unwrap();

        let job = mgr
            .update_job(&job.id, &JobUpdate::status(JobStatus::Processing))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Processing);

        let job = mgr
            .update_job(&job.id, &JobUpdate::completed("out.mp4"))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.output_ref.as_deref(), Some("out.mp4"));
        assert_eq!(job.progress.percentage, 100);
    }

    #[tokio::test]
    async fn test_same_status_rewrite_allowed() {
        let mgr = manager();
        let job = mgr.create_job("translate", "in.srt").await.unwrap();
        mgr.update_job(&job.id, &JobUpdate::status(JobStatus::Processing))
            .await
            .unwrap();

        // Repeated processing flushes are not transitions
        for pct in [10, 40, 70] {
            let job = mgr
                .update_job(
                    &job.id,
                    &JobUpdate::processing(JobProgress::new(pct, "working", "batch")),
                )
                .await
                .unwrap();
            assert_eq!(job.progress.percentage, pct);
        }
    }

    #[tokio::test]
    async fn test_terminal_rejects_all_writes() {
        let mgr = manager();
        let job = mgr.create_job("convert", "in.mkv").await.unwrap();
        mgr.update_job(&job.id, &JobUpdate::status(JobStatus::Processing))
            .await
            .unwrap();
        mgr.update_job(&job.id, &JobUpdate::completed("out.mp4"))
            .await
            .unwrap();

        let err = mgr
            .update_job(
                &job.id,
                &JobUpdate::failed(JobError::new(JobErrorKind::Internal, "late")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));

        // Document unchanged
        let job = mgr.get_job(&job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn test_skipping_processing_rejected() {
        let mgr = manager();
        let job = mgr.create_job("sync", "in.mkv").await.unwrap();

        let err = mgr
            .update_job(&job.id, &JobUpdate::completed("out.srt"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::IllegalTransition {
                from: JobStatus::Starting,
                to: JobStatus::Completed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_sets_flag_not_status() {
        let mgr = manager();
        let job = mgr.create_job("convert", "in.mkv").await.unwrap();
        mgr.update_job(&job.id, &JobUpdate::status(JobStatus::Processing))
            .await
            .unwrap();

        let job = mgr.cancel_job(&job.id).await.unwrap();
        assert!(job.cancel_requested);
        assert_eq!(job.status, JobStatus::Processing);

        // Worker observes the flag and performs the transition
        let job = mgr
            .update_job(&job.id, &JobUpdate::cancelled())
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_on_terminal_rejected() {
        let mgr = manager();
        let job = mgr.create_job("remux", "in.mkv").await.unwrap();
        mgr.update_job(&job.id, &JobUpdate::status(JobStatus::Processing))
            .await
            .unwrap();
        mgr.update_job(&job.id, &JobUpdate::completed("out.mp4"))
            .await
            .unwrap();

        let err = mgr.cancel_job(&job.id).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::IllegalTransition {
                from: JobStatus::Completed,
                to: JobStatus::Cancelled,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_missing_job() {
        let mgr = manager();
        assert!(matches!(
            mgr.cancel_job(&JobId::new()).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
