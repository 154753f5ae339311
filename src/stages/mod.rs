// Stage bodies wired into pipeline steps
//
// Each stage takes a `PipelineState`, produces its artifact next to the
// source through `atomic_output`, and returns the state with the output
// recorded. Intermediate files are scoped with `TempFiles`.

mod compress;
mod enhance;
mod normalize;
mod srt;
mod transcribe;
mod video;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Result, ScribeError};
use crate::media::MediaProcessorTrait;
use crate::pipeline::{naming, PipelineState};
use crate::transcribe::TranscriberTrait;

pub use transcribe::block_on;

/// Collaborators shared by every stage
pub struct Stages {
    pub media: Arc<dyn MediaProcessorTrait>,
    pub transcriber: Arc<dyn TranscriberTrait>,
    pub config: Config,
}

impl Stages {
    pub fn new(
        media: Arc<dyn MediaProcessorTrait>,
        transcriber: Arc<dyn TranscriberTrait>,
        config: Config,
    ) -> Self {
        Self {
            media,
            transcriber,
            config,
        }
    }
}

/// Final location of a named output for this state's source
pub(crate) fn step_output(state: &PipelineState, name: &str) -> Result<PathBuf> {
    naming::output_path(state.source(), name)
        .ok_or_else(|| ScribeError::Config(format!("No output naming for step '{}'", name)))
}

/// Audio the later stages should work from: enhanced, else normalized, else the source
pub(crate) fn best_audio(state: &PipelineState) -> PathBuf {
    state
        .latest_audio(&[naming::ENHANCE, naming::NORMALIZE])
        .to_path_buf()
}
