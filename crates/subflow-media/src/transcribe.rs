//! External speech-to-text invocation for subtitle synchronization.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use subflow_models::{parse_srt, SubtitleEntry};

use crate::error::{MediaError, MediaResult};

/// Transcriber configuration.
#[derive(Debug, Clone)]
pub struct TranscriberConfig {
    /// Transcriber binary name (whisper-compatible CLI)
    pub binary: String,
    /// Model size passed via --model
    pub model: String,
    /// Source language hint, autodetected when absent
    pub language: Option<String>,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            binary: "whisper".to_string(),
            model: "small".to_string(),
            language: None,
        }
    }
}

impl TranscriberConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            binary: std::env::var("TRANSCRIBER_BIN").unwrap_or_else(|_| "whisper".to_string()),
            model: std::env::var("TRANSCRIBER_MODEL").unwrap_or_else(|_| "small".to_string()),
            language: std::env::var("TRANSCRIBER_LANGUAGE").ok(),
        }
    }
}

/// Runs a whisper-compatible CLI against audio samples and returns the
/// transcript as subtitle cues timed relative to the sample start.
#[derive(Debug, Clone)]
pub struct Transcriber {
    config: TranscriberConfig,
}

impl Transcriber {
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }

    /// Transcribe `audio` into SRT cues. The CLI writes `<stem>.srt` into
    /// `output_dir`; that file is parsed and returned.
    pub async fn transcribe(
        &self,
        audio: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> MediaResult<Vec<SubtitleEntry>> {
        let audio = audio.as_ref();
        let output_dir = output_dir.as_ref();

        which::which(&self.config.binary)
            .map_err(|_| MediaError::TranscriberNotFound(self.config.binary.clone()))?;

        let mut cmd = Command::new(&self.config.binary);
        cmd.arg(audio)
            .args(["--model", &self.config.model])
            .args(["--output_format", "srt"])
            .arg("--output_dir")
            .arg(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(ref language) = self.config.language {
            cmd.args(["--language", language]);
        }

        debug!(audio = %audio.display(), model = %self.config.model, "Transcribing sample");
        let output = cmd.output().await?;

        if !output.status.success() {
            return Err(MediaError::TranscriptionFailed(format!(
                "{} exited with {:?}: {}",
                self.config.binary,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let srt_path = transcript_path(audio, output_dir);
        let content = tokio::fs::read_to_string(&srt_path).await.map_err(|e| {
            MediaError::TranscriptionFailed(format!(
                "transcript {} unreadable: {}",
                srt_path.display(),
                e
            ))
        })?;

        let entries = parse_srt(&content)
            .map_err(|e| MediaError::TranscriptionFailed(format!("bad transcript: {}", e)))?;
        info!(cues = entries.len(), "Transcription complete");
        Ok(entries)
    }
}

/// Location of the SRT the transcriber writes for a given audio file.
fn transcript_path(audio: &Path, output_dir: &Path) -> PathBuf {
    let stem = audio
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "transcript".to_string());
    output_dir.join(format!("{}.srt", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_path() {
        let path = transcript_path(Path::new("/tmp/work/sample_2.wav"), Path::new("/tmp/work"));
        assert_eq!(path, PathBuf::from("/tmp/work/sample_2.srt"));
    }

    #[test]
    fn test_config_defaults() {
        let config = TranscriberConfig::default();
        assert_eq!(config.binary, "whisper");
        assert_eq!(config.model, "small");
        assert!(config.language.is_none());
    }
}
