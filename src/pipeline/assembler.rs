//! Turns configuration and the detected media kind into an ordered list of
//! steps. Every configuration decision is captured here, in closures, so
//! stage bodies never consult the skip flags themselves.

use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{Result, ScribeError};
use crate::media::MediaKind;
use crate::stages::Stages;
use super::naming;
use super::observer::PipelineObserver;
use super::orchestrator::{output_exists, Orchestrator};
use super::state::PipelineState;
use super::step::StepDescriptor;

pub struct PipelineAssembler {
    config: PipelineConfig,
    stages: Arc<Stages>,
}

impl PipelineAssembler {
    pub fn new(stages: Arc<Stages>) -> Self {
        Self {
            config: stages.config.pipeline.clone(),
            stages,
        }
    }

    /// Whether a black video is generated for this kind of input
    fn wants_video(&self, kind: MediaKind) -> bool {
        self.config.video_output || (kind == MediaKind::Audio && self.config.compress_ratio.is_some())
    }

    pub fn steps(&self, kind: MediaKind) -> Vec<StepDescriptor> {
        let mut steps = Vec::new();

        let stages = self.stages.clone();
        let skip_normalize = self.config.skip_normalize;
        steps.push(
            stage_step(naming::NORMALIZE, move |s| stages.normalize(s))
                .with_user_skip(move |_| skip_normalize),
        );

        let stages = self.stages.clone();
        let skip_enhance = self.config.skip_enhance;
        steps.push(
            stage_step(naming::ENHANCE, move |s| stages.enhance(s))
                .with_user_skip(move |_| skip_enhance),
        );

        let stages = self.stages.clone();
        steps.push(
            stage_step(naming::TRANSCRIBE, move |s| stages.transcribe(s))
                .with_restorer(restore_transcription),
        );

        let stages = self.stages.clone();
        steps.push(stage_step(naming::SRT, move |s| stages.srt(s)));

        if self.wants_video(kind) {
            let stages = self.stages.clone();
            steps.push(stage_step(naming::VIDEO, move |s| stages.video(s)));
        }

        if let Some(ratio) = self.config.compress_ratio {
            let stages = self.stages.clone();
            steps.push(stage_step(naming::COMPRESS, move |s| {
                let target = compression_target(&s, kind)?;
                stages.compress(s, &target, ratio)
            }));
        }

        debug!(
            "Assembled {} pipeline: {:?}",
            kind.as_str(),
            steps.iter().map(StepDescriptor::name).collect::<Vec<_>>()
        );
        steps
    }

    /// Orchestrator for one source, with its ledger next to the source
    pub fn assemble<I>(&self, source: &Path, kind: MediaKind, observers: I) -> Orchestrator
    where
        I: IntoIterator<Item = Arc<dyn PipelineObserver>>,
    {
        Orchestrator::new(self.steps(kind), naming::ledger_path(source)).with_observers(observers)
    }
}

/// Step whose output is found through the naming table and restored under its own name
fn stage_step<F>(name: &'static str, transform: F) -> StepDescriptor
where
    F: Fn(PipelineState) -> Result<PipelineState> + Send + Sync + 'static,
{
    StepDescriptor::new(name, transform)
        .with_output(move |state| naming::output_path(state.source(), name))
        .with_restorer(move |state, out| state.with_output(name, out))
}

/// The transcribe step owns two files; a skip must bring back both.
fn restore_transcription(state: PipelineState, words: &Path) -> PipelineState {
    let state = state.with_output(naming::TRANSCRIBE, words);
    match naming::output_path(state.source(), naming::TRANSCRIPT) {
        Some(text) if output_exists(&text) => state.with_output(naming::TRANSCRIPT, text),
        _ => state,
    }
}

/// Video input compresses the source itself; audio input compresses the
/// generated black video.
fn compression_target(state: &PipelineState, kind: MediaKind) -> Result<std::path::PathBuf> {
    match kind {
        MediaKind::Video => Ok(state.source().to_path_buf()),
        MediaKind::Audio => state
            .output(naming::VIDEO)
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                ScribeError::MissingInput(format!("{} needs {} output", naming::COMPRESS, naming::VIDEO))
            }),
    }
}
