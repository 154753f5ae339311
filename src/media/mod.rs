// Media processing on top of ffmpeg/ffprobe
//
// - Commands: command builder and execution (with progress parsing)
// - Probe: stream/format inspection, media kind detection, bitrate math
// - Processor: the ffmpeg-backed implementation used by the stages

pub mod commands;
pub mod probe;
pub mod processor;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use commands::*;
pub use probe::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;
use crate::pipeline::ProgressSink;

/// Everything needed to re-encode a video at a target bitrate
#[derive(Debug, Clone, PartialEq)]
pub struct CompressRequest {
    /// Video (and, without `audio`, audio) input
    pub input: PathBuf,
    /// Replacement audio track, e.g. enhanced speech
    pub audio: Option<PathBuf>,
    pub output: PathBuf,
    pub video_kbps: u32,
    /// Used to turn ffmpeg's elapsed output time into progress
    pub duration_secs: f64,
    /// Whether any audio track ends up in the output
    pub has_audio: bool,
}

/// Main trait for media processing operations.
///
/// All operations block until the underlying tool exits.
#[cfg_attr(test, mockall::automock)]
pub trait MediaProcessorTrait: Send + Sync {
    /// Decode the audio track to mono PCM WAV at `sample_rate`
    fn extract_wav(&self, input: &Path, output: &Path, sample_rate: u32) -> Result<()>;

    /// EBU R128 loudness normalization
    fn normalize_loudness(&self, input: &Path, output: &Path) -> Result<()>;

    /// Run an ffmpeg audio filter chain, writing WAV
    fn apply_audio_filter(&self, input: &Path, output: &Path, filter: &str) -> Result<()>;

    /// Encode to AAC (M4A container)
    fn encode_aac(&self, input: &Path, output: &Path) -> Result<()>;

    /// Black video track muxed with the given audio
    fn black_video(&self, audio: &Path, output: &Path) -> Result<()>;

    /// Re-encode video at the requested bitrate
    fn compress_video(&self, request: &CompressRequest, progress: Option<ProgressSink>) -> Result<()>;

    /// Inspect streams and container
    fn probe(&self, path: &Path) -> Result<MediaInfo>;

    /// Check if media tools are available
    fn check_availability(&self) -> Result<()>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Arc<dyn MediaProcessorTrait> {
        Arc::new(processor::MediaProcessorImpl::new(config))
    }
}
