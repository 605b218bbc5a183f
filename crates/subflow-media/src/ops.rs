//! High-level media operations built on the ffmpeg runner.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Audio bitrate used when transcoding to AAC.
const AAC_BITRATE: &str = "192k";

/// Build the conversion command: transcode audio to AAC for playback
/// compatibility while stream-copying video and subtitles.
pub fn convert_command(input: impl AsRef<Path>, output: impl AsRef<Path>) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .map_all()
        .video_codec("copy")
        .audio_codec("aac")
        .audio_bitrate(AAC_BITRATE)
        .subtitle_codec("copy")
}

/// Build the remux command: repackage streams into MP4 without re-encoding.
pub fn remux_command(input: impl AsRef<Path>, output: impl AsRef<Path>) -> FfmpegCommand {
    FfmpegCommand::new(input, output).copy_all().faststart()
}

/// Extract a mono 16 kHz WAV sample for transcription, starting at
/// `offset_secs` and lasting `duration_secs`.
pub async fn extract_audio_sample(
    runner: &FfmpegRunner,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    offset_secs: f64,
    duration_secs: f64,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(input, output)
        .seek(offset_secs)
        .duration(duration_secs)
        .no_video()
        .audio_codec("pcm_s16le")
        .audio_channels(1)
        .audio_sample_rate(16_000);
    runner.run(&cmd).await
}

/// Plan of audio sample windows across a media file.
#[derive(Debug, Clone)]
pub struct SamplePlan {
    /// Start offsets in seconds
    pub offsets: Vec<f64>,
    /// Length of each sample in seconds
    pub sample_secs: f64,
}

impl SamplePlan {
    /// Spread `count` sample windows evenly across the file, leaving a
    /// margin at each end so credits and silence dominate no window. Files
    /// shorter than the margins collapse to a single sample at the start.
    pub fn evenly_spaced(duration_secs: f64, count: usize, sample_secs: f64) -> Self {
        let margin = sample_secs;
        let usable = duration_secs - 2.0 * margin - sample_secs;

        if count <= 1 || usable <= 0.0 {
            let len = sample_secs.min(duration_secs.max(1.0));
            return Self {
                offsets: vec![0.0],
                sample_secs: len,
            };
        }

        let step = usable / (count - 1) as f64;
        let offsets = (0..count).map(|i| margin + step * i as f64).collect();
        Self {
            offsets,
            sample_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_command_preserves_streams() {
        let args = convert_command("in.mkv", "out.mkv").build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-map 0"));
        assert!(joined.contains("-c:v copy"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("-b:a 192k"));
        assert!(joined.contains("-c:s copy"));
    }

    #[test]
    fn test_remux_command_copies_without_encoding() {
        let args = remux_command("in.mkv", "out.mp4").build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-c copy"));
        assert!(joined.contains("-movflags +faststart"));
        assert!(!joined.contains("-c:v"));
    }

    #[test]
    fn test_sample_plan_even_spacing() {
        let plan = SamplePlan::evenly_spaced(3600.0, 5, 45.0);
        assert_eq!(plan.offsets.len(), 5);
        assert!((plan.offsets[0] - 45.0).abs() < 0.01);

        // Last window ends before the tail margin
        let last = *plan.offsets.last().unwrap();
        assert!(last + 45.0 <= 3600.0 - 45.0 + 0.01);

        // Evenly spaced
        let step = plan.offsets[1] - plan.offsets[0];
        for pair in plan.offsets.windows(2) {
            assert!((pair[1] - pair[0] - step).abs() < 0.01);
        }
    }

    #[test]
    fn test_sample_plan_short_file() {
        let plan = SamplePlan::evenly_spaced(60.0, 5, 45.0);
        assert_eq!(plan.offsets, vec![0.0]);
        assert!(plan.sample_secs <= 60.0);
    }
}
