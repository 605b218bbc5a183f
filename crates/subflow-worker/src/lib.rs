//! Job execution: per-kind drivers plus the dispatch glue that moves a job
//! through its lifecycle and records the outcome.

pub mod config;
pub mod context;
pub mod error;
pub mod sync;
pub mod transcode;
pub mod translate;

use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use subflow_models::{Job, JobKind, JobStatus, JobUpdate};

pub use config::WorkerConfig;
pub use context::JobContext;
pub use error::{WorkerError, WorkerResult};
pub use translate::TranslateParams;

/// Run one job end to end: transition to `processing`, execute the driver
/// for its kind, and record the terminal outcome on the document.
pub async fn execute_job(ctx: JobContext, job: Job, params: TranslateParams) {
    let id = job.id.clone();

    if let Err(e) = ctx
        .manager
        .update_job(&id, &JobUpdate::status(JobStatus::Processing))
        .await
    {
        // Cancelled before any work started, or the document vanished
        warn!(job_id = %id, error = %e, "Job never reached processing");
        return;
    }

    let result = match job.kind {
        JobKind::Convert | JobKind::Remux => transcode::run_transcode(&ctx, &job).await,
        JobKind::Translate => translate::run_translate(&ctx, &job, &params).await,
        JobKind::Sync => sync::run_sync(&ctx, &job).await,
    };

    let update = match result {
        Ok(output_ref) => {
            info!(job_id = %id, kind = %job.kind, "Job completed");
            counter!("subflow_jobs_total", "kind" => job.kind.as_str(), "outcome" => "completed")
                .increment(1);
            JobUpdate::completed(output_ref)
        }
        Err(e) if e.is_cancellation() => {
            info!(job_id = %id, kind = %job.kind, "Job cancelled");
            counter!("subflow_jobs_total", "kind" => job.kind.as_str(), "outcome" => "cancelled")
                .increment(1);
            JobUpdate::cancelled()
        }
        Err(e) => {
            error!(job_id = %id, kind = %job.kind, error = %e, "Job failed");
            counter!("subflow_jobs_total", "kind" => job.kind.as_str(), "outcome" => "error")
                .increment(1);
            JobUpdate::failed(e.to_job_error())
        }
    };

    if let Err(e) = ctx.manager.update_job(&id, &update).await {
        error!(job_id = %id, error = %e, "Failed to record job outcome");
    }
}

/// Spawn a job onto the runtime, detached from the request that created it.
pub fn spawn_job(ctx: JobContext, job: Job, params: TranslateParams) -> JoinHandle<()> {
    tokio::spawn(execute_job(ctx, job, params))
}
