// Speech-to-text backends behind one trait
//
// - AssemblyAI: hosted API with speaker labels
// - WhisperCpp: local whisper.cpp CLI
//
// Every backend returns a `Transcript` (word list in milliseconds), which the
// transcribe stage writes out as `_timestamps.json` and `_transcript.txt`.

pub mod assemblyai;
pub mod common;
pub mod whisper_cpp;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub use common::*;
use crate::config::{TranscriberBackend, TranscriberConfig};
use crate::error::Result;
use crate::media::MediaProcessorTrait;
use crate::pipeline::ProgressSink;

/// Main trait for transcription operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriberTrait: Send + Sync {
    /// Transcribe an audio file into timed words
    async fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
        progress: Option<ProgressSink>,
    ) -> Result<Transcript>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    /// Create the backend selected in the configuration
    pub fn create_transcriber(
        config: &TranscriberConfig,
        media: Arc<dyn MediaProcessorTrait>,
    ) -> Arc<dyn TranscriberTrait> {
        match config.backend {
            TranscriberBackend::AssemblyAi => {
                Arc::new(assemblyai::AssemblyAiTranscriber::new(config.assemblyai.clone()))
            }
            TranscriberBackend::Whisper => {
                Arc::new(whisper_cpp::WhisperCppTranscriber::new(config.whisper.clone(), media))
            }
        }
    }
}
