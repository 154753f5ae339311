use std::path::Path;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, ScribeError};
use crate::pipeline::ProgressSink;
use super::{CompressRequest, MediaCommandBuilder, MediaInfo, MediaProcessorTrait};

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path, &config.probe_path);

        Self {
            config,
            command_builder,
        }
    }

    /// Get media processor version information
    pub fn version_info(&self) -> Result<String> {
        let stdout = self.command_builder.version_check().execute_capture()?;
        Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
    }
}

impl MediaProcessorTrait for MediaProcessorImpl {
    fn extract_wav(&self, input: &Path, output: &Path, sample_rate: u32) -> Result<()> {
        debug!("Extracting {} Hz WAV from {} to {}", sample_rate, input.display(), output.display());
        self.command_builder
            .extract_wav(input, output, sample_rate)
            .execute()
    }

    fn normalize_loudness(&self, input: &Path, output: &Path) -> Result<()> {
        debug!("Normalizing loudness {} -> {}", input.display(), output.display());
        self.command_builder.normalize_loudness(input, output).execute()
    }

    fn apply_audio_filter(&self, input: &Path, output: &Path, filter: &str) -> Result<()> {
        debug!("Filtering {} with {}", input.display(), filter);
        self.command_builder.audio_filter(input, output, filter).execute()
    }

    fn encode_aac(&self, input: &Path, output: &Path) -> Result<()> {
        debug!("Encoding AAC {} -> {}", input.display(), output.display());
        self.command_builder
            .encode_aac(input, output, &self.config.audio_bitrate)
            .execute()
    }

    fn black_video(&self, audio: &Path, output: &Path) -> Result<()> {
        info!(
            "Generating {}x{} black video for {}",
            self.config.video_width,
            self.config.video_height,
            audio.display()
        );
        self.command_builder
            .black_video(
                audio,
                output,
                self.config.video_width,
                self.config.video_height,
                self.config.video_fps,
            )
            .execute()
    }

    fn compress_video(&self, request: &CompressRequest, progress: Option<ProgressSink>) -> Result<()> {
        info!(
            "Compressing {} at {} kbps -> {}",
            request.input.display(),
            request.video_kbps,
            request.output.display()
        );

        let command = self.command_builder.compress(
            request,
            &self.config.encoder,
            self.config.compress_audio_kbps,
        );

        let total_ms = (request.duration_secs * 1000.0).max(0.0) as u64;
        command.execute_with_progress(|elapsed| {
            if let Some(sink) = &progress {
                if total_ms > 0 {
                    let done = (elapsed.as_millis() as u64).min(total_ms);
                    sink.report(done, total_ms);
                }
            }
        })?;

        if let Some(sink) = &progress {
            if total_ms > 0 {
                sink.report(total_ms, total_ms);
            }
        }
        Ok(())
    }

    fn probe(&self, path: &Path) -> Result<MediaInfo> {
        if !path.exists() {
            return Err(ScribeError::FileNotFound(path.display().to_string()));
        }
        let json = self.command_builder.probe(path).execute_capture()?;
        MediaInfo::from_probe_json(path, &json)
    }

    /// Check if media processor is available
    fn check_availability(&self) -> Result<()> {
        self.command_builder
            .version_check()
            .execute()
            .map_err(|e| ScribeError::Media(format!("Media processor not found: {}", e)))?;
        self.command_builder
            .probe_version_check()
            .execute()
            .map_err(|e| ScribeError::Media(format!("Media probe not found: {}", e)))?;

        info!("Media processor is available");
        Ok(())
    }
}
