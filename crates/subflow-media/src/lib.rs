//! Media processing: ffmpeg/ffprobe subprocess plumbing, transcode
//! operations, and audio sampling for subtitle synchronization.

pub mod command;
pub mod error;
pub mod ops;
pub mod probe;
pub mod progress;
pub mod transcribe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use ops::{convert_command, extract_audio_sample, remux_command, SamplePlan};
pub use probe::{probe_media, MediaInfo};
pub use progress::TranscodeProgress;
pub use transcribe::{Transcriber, TranscriberConfig};
