use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::fsutil::atomic_output;
use crate::media::{calculate_video_bitrate, CompressRequest};
use crate::pipeline::{naming, PipelineState};
use super::{step_output, Stages};

impl Stages {
    /// Re-encode `target` so the result lands near `ratio` of its size.
    ///
    /// Enhanced speech, when present, replaces the video's own audio track.
    pub fn compress(&self, state: PipelineState, target: &Path, ratio: f64) -> Result<PipelineState> {
        let output = step_output(&state, naming::COMPRESS)?;

        let info = self.media.probe(target)?;
        let audio = state.output(naming::ENHANCE).map(Path::to_path_buf);
        let has_audio = info.has_audio || audio.is_some();

        let video_kbps = calculate_video_bitrate(
            &info,
            ratio,
            self.config.media.compress_audio_kbps,
            self.config.media.min_video_kbps,
        )?;
        info!(
            "Compressing {} ({:.1} MB, {:.0}s) at {} kbps",
            target.display(),
            info.size_bytes as f64 / 1_000_000.0,
            info.duration_secs,
            video_kbps
        );

        atomic_output(&output, |tmp| {
            let request = CompressRequest {
                input: target.to_path_buf(),
                audio,
                output: tmp.to_path_buf(),
                video_kbps,
                duration_secs: info.duration_secs,
                has_audio,
            };
            self.media.compress_video(&request, state.progress().cloned())
        })?;

        Ok(state.with_output(naming::COMPRESS, output))
    }
}
