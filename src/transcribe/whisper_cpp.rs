use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::WhisperConfig;
use crate::error::{Result, ScribeError};
use crate::media::MediaProcessorTrait;
use crate::pipeline::ProgressSink;
use super::{TranscribeOptions, TranscriberTrait, Transcript, Word};

/// whisper.cpp wants 16 kHz mono PCM
const WHISPER_SAMPLE_RATE: u32 = 16_000;
const PROGRESS_TOTAL: u64 = 3;

/// whisper.cpp `-oj` output
#[derive(Debug, Deserialize)]
pub struct WhisperCppOutput {
    #[serde(default)]
    pub result: Option<WhisperCppResult>,
    #[serde(default)]
    pub transcription: Vec<WhisperCppSegment>,
}

#[derive(Debug, Deserialize)]
pub struct WhisperCppResult {
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WhisperCppSegment {
    pub offsets: WhisperCppOffsets,
    pub text: String,
}

/// Segment bounds in milliseconds
#[derive(Debug, Deserialize)]
pub struct WhisperCppOffsets {
    pub from: u64,
    pub to: u64,
}

impl WhisperCppOutput {
    /// whisper.cpp times segments, not words: spread each segment's span
    /// over its words by character count.
    pub fn into_transcript(self) -> Transcript {
        let mut words = Vec::new();
        for segment in self.transcription {
            let tokens: Vec<&str> = segment.text.split_whitespace().collect();
            let total_chars: usize = tokens.iter().map(|t| t.chars().count()).sum();
            if total_chars == 0 {
                continue;
            }

            let span = segment.offsets.to.saturating_sub(segment.offsets.from);
            let mut seen = 0usize;
            for token in tokens {
                let start = segment.offsets.from + span * seen as u64 / total_chars as u64;
                seen += token.chars().count();
                let end = segment.offsets.from + span * seen as u64 / total_chars as u64;
                words.push(Word::new(token, start, end));
            }
        }

        Transcript {
            words,
            language: self.result.and_then(|r| r.language),
        }
    }
}

/// Runs the whisper.cpp CLI on a 16 kHz WAV rendition of the input
pub struct WhisperCppTranscriber {
    config: WhisperConfig,
    media: Arc<dyn MediaProcessorTrait>,
}

impl WhisperCppTranscriber {
    pub fn new(config: WhisperConfig, media: Arc<dyn MediaProcessorTrait>) -> Self {
        Self { config, media }
    }
}

#[async_trait]
impl TranscriberTrait for WhisperCppTranscriber {
    async fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
        progress: Option<ProgressSink>,
    ) -> Result<Transcript> {
        let report = |done: u64| {
            if let Some(sink) = &progress {
                sink.report(done, PROGRESS_TOTAL);
            }
        };

        // Scratch space is removed when `work_dir` drops, on every exit path.
        let work_dir = tempfile::tempdir()
            .map_err(|e| ScribeError::Transcription(format!("Failed to create temp directory: {}", e)))?;
        let wav = work_dir.path().join("input.wav");
        let output_prefix = work_dir.path().join("output");

        self.media.extract_wav(audio_path, &wav, WHISPER_SAMPLE_RATE)?;
        report(1);

        info!("Running whisper.cpp on {}", audio_path.display());
        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg("-m").arg(&self.config.model_path)
            .arg("-f").arg(&wav)
            .arg("-oj")
            .arg("-of").arg(&output_prefix)
            .arg("-t").arg(self.config.threads.to_string())
            .arg("-l").arg(options.language.as_deref().unwrap_or("auto"));

        let output = cmd.output().await.map_err(|e| {
            ScribeError::Transcription(format!("Failed to execute {}: {}", self.config.binary_path, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScribeError::Transcription(format!("whisper.cpp failed: {}", stderr)));
        }
        report(2);

        let json_file = output_prefix.with_extension("json");
        debug!("Reading whisper.cpp output from {}", json_file.display());
        let json_content = tokio::fs::read_to_string(&json_file).await.map_err(|e| {
            ScribeError::Transcription(format!("Failed to read whisper.cpp output: {}", e))
        })?;

        let parsed: WhisperCppOutput = serde_json::from_str(&json_content)
            .map_err(|e| ScribeError::Transcription(format!("Failed to parse whisper.cpp JSON: {}", e)))?;

        report(PROGRESS_TOTAL);
        Ok(parsed.into_transcript())
    }

    fn name(&self) -> &'static str {
        "whisper.cpp"
    }
}
