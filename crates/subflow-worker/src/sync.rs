//! Subtitle-video synchronization job driver.
//!
//! Strategy: sample short audio windows spread across the video, transcribe
//! each with the external speech-to-text tool, and measure how far the
//! transcript cues sit from the nearest subtitle cues. The median offset of
//! each sample votes; the mean of the votes shifts the whole subtitle file.

use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use subflow_media::ops::{extract_audio_sample, SamplePlan};
use subflow_media::{probe_media, FfmpegRunner, Transcriber};
use subflow_models::{generate_srt, parse_srt, Job, JobProgress, SubtitleEntry};

use crate::context::JobContext;
use crate::error::{WorkerError, WorkerResult};

/// Subtitle file name expected inside a sync job's input directory.
pub const SYNC_SUBTITLE_NAME: &str = "subtitles.srt";
/// Prefix of the video file inside a sync job's input directory.
pub const SYNC_VIDEO_PREFIX: &str = "video";

/// Run a sync job. `input_ref` is a directory containing `video.<ext>` and
/// `subtitles.srt`; the output is a shifted copy of the subtitle file.
pub async fn run_sync(ctx: &JobContext, job: &Job) -> WorkerResult<String> {
    let input_dir = PathBuf::from(&job.input_ref);
    let video = find_video(&input_dir).await?;
    let srt_path = input_dir.join(SYNC_SUBTITLE_NAME);

    let content = tokio::fs::read_to_string(&srt_path)
        .await
        .map_err(|e| WorkerError::InvalidInput(format!("cannot read subtitles: {}", e)))?;
    let entries = parse_srt(&content)
        .map_err(|e| WorkerError::InvalidInput(format!("bad subtitle file: {}", e)))?;
    // parse_srt only admits entries with valid timing lines
    let subtitle_starts: Vec<i64> = entries.iter().filter_map(|e| e.start_ms()).collect();

    let info = probe_media(&video).await?;
    let plan = SamplePlan::evenly_spaced(
        info.duration_secs,
        ctx.config.sync_sample_count,
        ctx.config.sync_sample_secs,
    );

    let job_dir = ctx.config.job_dir(job.id.as_str());
    tokio::fs::create_dir_all(&job_dir).await?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let runner = FfmpegRunner::new().with_cancel(cancel_rx.clone());
    let transcriber = Transcriber::new(ctx.config.transcriber.clone());

    let total = plan.offsets.len();
    let mut sample_offsets: Vec<i64> = Vec::with_capacity(total);

    for (i, &offset_secs) in plan.offsets.iter().enumerate() {
        // Cancellation check doubles as the progress flush for this stage
        let pct = ((i * 90 / total.max(1)) as u8).min(99);
        let progress = JobProgress::new(
            pct,
            format!("analyzing sample {}/{}", i + 1, total),
            "synchronizing",
        );
        if ctx.flush_tick(&job.id, progress).await? {
            let _ = cancel_tx.send(true);
            return Err(WorkerError::Cancelled);
        }

        let wav = job_dir.join(format!("sample_{}.wav", i));
        extract_audio_sample(&runner, &video, &wav, offset_secs, plan.sample_secs).await?;

        let cues = match transcriber.transcribe(&wav, &job_dir).await {
            Ok(cues) => cues,
            Err(e) => {
                // One bad sample does not sink the job; the quorum check does
                warn!(sample = i + 1, error = %e, "Sample transcription failed, skipping");
                continue;
            }
        };

        let offset_ms = (offset_secs * 1000.0) as i64;
        let transcript_starts: Vec<i64> = cues
            .iter()
            .filter_map(|c| c.start_ms())
            .map(|ms| ms + offset_ms)
            .collect();

        let mut diffs = match_offsets(
            &transcript_starts,
            &subtitle_starts,
            ctx.config.sync_match_window_ms,
        );
        match median(&mut diffs) {
            Some(m) => {
                debug!(sample = i + 1, median_ms = m, matches = diffs.len(), "Sample offset");
                sample_offsets.push(m);
            }
            None => warn!(sample = i + 1, "No subtitle cues matched this sample"),
        }
    }

    if sample_offsets.len() < ctx.config.sync_min_offsets {
        return Err(WorkerError::InsufficientSamples {
            got: sample_offsets.len(),
            need: ctx.config.sync_min_offsets,
        });
    }

    let shift_ms = sample_offsets.iter().sum::<i64>() / sample_offsets.len() as i64;
    info!(
        job_id = %job.id,
        shift_ms,
        samples = sample_offsets.len(),
        "Computed subtitle shift"
    );

    let shifted: Vec<SubtitleEntry> = entries
        .iter()
        .map(|e| e.shifted(shift_ms).unwrap_or_else(|| e.clone()))
        .collect();
    let output = job_dir.join("synced.srt");
    tokio::fs::write(&output, generate_srt(&shifted)).await?;

    Ok(output.to_string_lossy().to_string())
}

/// Locate the `video.<ext>` file inside the input directory.
async fn find_video(dir: &Path) -> WorkerResult<PathBuf> {
    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| WorkerError::InvalidInput(format!("cannot read {}: {}", dir.display(), e)))?;
    while let Some(entry) = reader.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(SYNC_VIDEO_PREFIX) && !name.ends_with(".srt") {
            return Ok(entry.path());
        }
    }
    Err(WorkerError::InvalidInput(format!(
        "no video file in {}",
        dir.display()
    )))
}

/// For each transcript cue, the signed distance to the closest subtitle cue
/// within the window. Positive means the subtitles fire too early.
fn match_offsets(transcript_starts: &[i64], subtitle_starts: &[i64], window_ms: i64) -> Vec<i64> {
    let mut diffs = Vec::new();
    for &t in transcript_starts {
        let closest = subtitle_starts
            .iter()
            .map(|&s| t - s)
            .min_by_key(|d| d.abs());
        if let Some(d) = closest {
            if d.abs() <= window_ms {
                diffs.push(d);
            }
        }
    }
    diffs
}

fn median(values: &mut [i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2)
    } else {
        Some(values[mid])
    }
}
