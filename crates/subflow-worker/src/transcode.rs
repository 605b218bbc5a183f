//! Convert and remux job drivers.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::info;

use subflow_media::ops::{convert_command, remux_command};
use subflow_media::{probe_media, FfmpegRunner, TranscodeProgress};
use subflow_models::{Job, JobKind, JobProgress};

use crate::context::{JobContext, ProgressGauge};
use crate::error::{WorkerError, WorkerResult};

/// Run a convert or remux job to completion, flushing progress and checking
/// for cancellation on the configured cadence. Returns the output artifact
/// path.
pub async fn run_transcode(ctx: &JobContext, job: &Job) -> WorkerResult<String> {
    let input = PathBuf::from(&job.input_ref);
    if !input.exists() {
        return Err(WorkerError::InvalidInput(format!(
            "input file missing: {}",
            input.display()
        )));
    }

    let info = probe_media(&input).await?;
    let total_ms = info.duration_ms();

    let job_dir = ctx.config.job_dir(job.id.as_str());
    tokio::fs::create_dir_all(&job_dir).await?;

    let (stage, output) = match job.kind {
        JobKind::Convert => {
            // Keep the source container; only the audio codec changes
            let ext = input
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("mkv")
                .to_string();
            ("converting", job_dir.join(format!("converted.{}", ext)))
        }
        JobKind::Remux => ("remuxing", job_dir.join("remuxed.mp4")),
        other => {
            return Err(WorkerError::InvalidInput(format!(
                "not a transcode kind: {}",
                other
            )))
        }
    };

    let cmd = match job.kind {
        JobKind::Convert => convert_command(&input, &output),
        _ => remux_command(&input, &output),
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let runner = FfmpegRunner::new().with_cancel(cancel_rx);

    let latest = Arc::new(Mutex::new(TranscodeProgress::default()));
    let sink = Arc::clone(&latest);
    let op = runner.run_with_progress(&cmd, move |p| {
        *sink.lock().unwrap_or_else(|e| e.into_inner()) = p;
    });
    tokio::pin!(op);

    let mut ticker = tokio::time::interval(ctx.config.flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut gauge = ProgressGauge::default();

    loop {
        tokio::select! {
            result = &mut op => {
                result?;
                break;
            }
            _ = ticker.tick() => {
                let snapshot = latest.lock().unwrap_or_else(|e| e.into_inner()).clone();
                let pct = gauge.observe(snapshot.percentage(total_ms).min(99));
                let progress = JobProgress::new(
                    pct,
                    format!("{} ({}%)", stage, pct),
                    stage,
                );
                if ctx.flush_tick(&job.id, progress).await? {
                    // Runner kills the subprocess and returns Cancelled
                    let _ = cancel_tx.send(true);
                }
            }
        }
    }

    info!(job_id = %job.id, output = %output.display(), "Transcode finished");
    Ok(output.to_string_lossy().to_string())
}
