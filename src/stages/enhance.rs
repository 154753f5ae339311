use tracing::info;

use crate::error::Result;
use crate::fsutil::{atomic_output, intermediate_path, TempFiles};
use crate::pipeline::{naming, PipelineState};
use super::{step_output, Stages};

impl Stages {
    /// Speech enhancement filter chain over the normalized audio (or the source)
    pub fn enhance(&self, state: PipelineState) -> Result<PipelineState> {
        let input = state.latest_audio(&[naming::NORMALIZE]).to_path_buf();
        let target = step_output(&state, naming::ENHANCE)?;
        info!("Enhancing speech in {}", input.display());

        let mut temps = TempFiles::default();
        let filtered = temps.track(intermediate_path(state.source(), "enhanced", "wav"));

        self.media
            .apply_audio_filter(&input, &filtered, &self.config.enhance.filter)?;
        state.report_progress(1, 2);

        atomic_output(&target, |tmp| self.media.encode_aac(&filtered, tmp))?;
        state.report_progress(2, 2);

        Ok(state.with_output(naming::ENHANCE, target))
    }
}
