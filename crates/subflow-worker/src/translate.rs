//! Translate job driver.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::info;

use subflow_models::{generate_srt, parse_srt, Job, JobProgress};
use subflow_translate::{BatcherConfig, TranslationBatcher};

use crate::context::{JobContext, ProgressGauge};
use crate::error::{WorkerError, WorkerResult};

/// Language pair for a translation job.
#[derive(Debug, Clone)]
pub struct TranslateParams {
    pub source_lang: String,
    pub target_lang: String,
}

impl Default for TranslateParams {
    fn default() -> Self {
        Self {
            source_lang: "auto".to_string(),
            target_lang: "English".to_string(),
        }
    }
}

/// Run a translate job: parse the input SRT, drive the batcher, and write
/// the reflowed translation as a new SRT artifact.
pub async fn run_translate(
    ctx: &JobContext,
    job: &Job,
    params: &TranslateParams,
) -> WorkerResult<String> {
    let input = PathBuf::from(&job.input_ref);
    let content = tokio::fs::read_to_string(&input)
        .await
        .map_err(|e| WorkerError::InvalidInput(format!("cannot read {}: {}", input.display(), e)))?;
    let entries = parse_srt(&content)
        .map_err(|e| WorkerError::InvalidInput(format!("bad subtitle file: {}", e)))?;

    let job_dir = ctx.config.job_dir(job.id.as_str());
    tokio::fs::create_dir_all(&job_dir).await?;
    let output = job_dir.join("translated.srt");

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let batcher = TranslationBatcher::new(ctx.translation_engine(), BatcherConfig::default())
        .with_cancel(cancel_rx);

    let batch_state = Arc::new(Mutex::new((0usize, 1usize)));
    let sink = Arc::clone(&batch_state);
    let op = batcher.translate_entries(&entries, &params.source_lang, &params.target_lang, {
        move |done, total| {
            *sink.lock().unwrap_or_else(|e| e.into_inner()) = (done, total);
        }
    });
    tokio::pin!(op);

    let mut ticker = tokio::time::interval(ctx.config.flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut gauge = ProgressGauge::default();

    let translated = loop {
        tokio::select! {
            result = &mut op => break result?,
            _ = ticker.tick() => {
                let (done, total) = *batch_state.lock().unwrap_or_else(|e| e.into_inner());
                let pct = gauge.observe(((done * 100 / total.max(1)) as u8).min(99));
                let progress = JobProgress::new(
                    pct,
                    format!("translating batch {}/{}", done.min(total.saturating_sub(1)) + 1, total),
                    "translating",
                );
                if ctx.flush_tick(&job.id, progress).await? {
                    // Batcher observes this between batches
                    let _ = cancel_tx.send(true);
                }
            }
        }
    };

    tokio::fs::write(&output, generate_srt(&translated)).await?;
    info!(
        job_id = %job.id,
        entries = translated.len(),
        output = %output.display(),
        "Translation finished"
    );
    Ok(output.to_string_lossy().to_string())
}
