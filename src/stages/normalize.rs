use tracing::info;

use crate::error::Result;
use crate::fsutil::{atomic_output, intermediate_path, TempFiles};
use crate::pipeline::{naming, PipelineState};
use super::{step_output, Stages};

/// Sample rate for the working WAV
const EXTRACT_SAMPLE_RATE: u32 = 48_000;

impl Stages {
    /// Source audio -> mono WAV -> EBU R128 loudness -> AAC `_normalized.m4a`
    pub fn normalize(&self, state: PipelineState) -> Result<PipelineState> {
        let source = state.source().to_path_buf();
        let target = step_output(&state, naming::NORMALIZE)?;
        info!("Normalizing {}", source.display());

        let mut temps = TempFiles::default();
        let raw = temps.track(intermediate_path(&source, "raw", "wav"));
        let leveled = temps.track(intermediate_path(&source, "norm", "wav"));

        self.media.extract_wav(&source, &raw, EXTRACT_SAMPLE_RATE)?;
        state.report_progress(1, 3);

        self.media.normalize_loudness(&raw, &leveled)?;
        state.report_progress(2, 3);

        atomic_output(&target, |tmp| self.media.encode_aac(&leveled, tmp))?;
        state.report_progress(3, 3);

        Ok(state.with_output(naming::NORMALIZE, target))
    }
}
