use std::future::Future;
use tracing::{info, warn};

use crate::error::Result;
use crate::fsutil::write_atomic;
use crate::pipeline::{naming, PipelineState};
use crate::transcribe::TranscribeOptions;
use super::{best_audio, step_output, Stages};

/// Drive an async backend to completion from a synchronous stage.
///
/// Uses the ambient runtime when called from a blocking worker thread and
/// spins up a current-thread runtime otherwise.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(future)),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            Ok(runtime.block_on(future))
        }
    }
}

impl Stages {
    /// Words to `_timestamps.json` and speaker turns to `_transcript.txt`
    pub fn transcribe(&self, state: PipelineState) -> Result<PipelineState> {
        let audio = best_audio(&state);
        let json_target = step_output(&state, naming::TRANSCRIBE)?;
        let text_target = step_output(&state, naming::TRANSCRIPT)?;

        let options = TranscribeOptions {
            language: self.config.transcriber.language.clone(),
            speakers: self.config.transcriber.speakers,
        };

        info!("Transcribing {} with {}", audio.display(), self.transcriber.name());
        let transcript = block_on(self.transcriber.transcribe(
            &audio,
            &options,
            state.progress().cloned(),
        ))??;

        if transcript.is_empty() {
            warn!("Transcription of {} produced no words", audio.display());
        }

        // The JSON is the step's locator, so it lands last.
        write_atomic(&text_target, transcript.render_text())?;
        write_atomic(&json_target, transcript.to_json()?)?;

        Ok(state
            .with_output(naming::TRANSCRIBE, json_target)
            .with_output(naming::TRANSCRIPT, text_target))
    }
}
