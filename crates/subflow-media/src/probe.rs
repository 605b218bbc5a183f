//! FFprobe media inspection.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// Summary of a media file, as far as the transcode pipeline needs it.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// Container duration in seconds
    pub duration_secs: f64,
    /// Codec of the first video stream, if any
    pub video_codec: Option<String>,
    /// Codec of the first audio stream, if any
    pub audio_codec: Option<String>,
    /// Container format name (e.g. "matroska,webm")
    pub container: String,
}

impl MediaInfo {
    pub fn duration_ms(&self) -> i64 {
        (self.duration_secs * 1000.0) as i64
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    format_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
}

/// Probe a media file with ffprobe.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("ffprobe failed on {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    Ok(parse_probe(probe))
}

fn parse_probe(probe: FfprobeOutput) -> MediaInfo {
    let find_codec = |kind: &str| {
        probe
            .streams
            .iter()
            .find(|s| s.codec_type == kind)
            .and_then(|s| s.codec_name.clone())
    };

    MediaInfo {
        duration_secs: probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or(0.0),
        video_codec: find_codec("video"),
        audio_codec: find_codec("audio"),
        container: probe.format.format_name.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_json() {
        let raw = r#"{
            "format": {"duration": "5400.123", "format_name": "matroska,webm"},
            "streams": [
                {"codec_type": "video", "codec_name": "h264"},
                {"codec_type": "audio", "codec_name": "dts"},
                {"codec_type": "subtitle", "codec_name": "subrip"}
            ]
        }"#;
        let probe: FfprobeOutput = serde_json::from_str(raw).unwrap();
        let info = parse_probe(probe);

        assert!((info.duration_secs - 5400.123).abs() < 0.001);
        assert_eq!(info.duration_ms(), 5_400_123);
        assert_eq!(info.video_codec.as_deref(), Some("h264"));
        assert_eq!(info.audio_codec.as_deref(), Some("dts"));
        assert_eq!(info.container, "matroska,webm");
    }

    #[test]
    fn test_parse_probe_missing_fields() {
        let raw = r#"{"format": {}}"#;
        let probe: FfprobeOutput = serde_json::from_str(raw).unwrap();
        let info = parse_probe(probe);

        assert_eq!(info.duration_secs, 0.0);
        assert!(info.video_codec.is_none());
        assert!(info.audio_codec.is_none());
    }
}
