use tracing::info;

use crate::error::Result;
use crate::fsutil::atomic_output;
use crate::pipeline::{naming, PipelineState};
use super::{best_audio, step_output, Stages};

impl Stages {
    /// Black video carrying the best available audio, for players that need a picture
    pub fn video(&self, state: PipelineState) -> Result<PipelineState> {
        let audio = best_audio(&state);
        let target = step_output(&state, naming::VIDEO)?;
        info!("Rendering {} with audio from {}", target.display(), audio.display());

        atomic_output(&target, |tmp| self.media.black_video(&audio, tmp))?;
        Ok(state.with_output(naming::VIDEO, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScribeError;
    use crate::media::MockMediaProcessorTrait;
    use crate::stages::test_support::{stages, touch};
    use crate::transcribe::MockTranscriberTrait;

    #[test]
    fn test_video_uses_enhanced_audio() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("talk.m4a");
        let enhanced = dir.path().join("talk_enhanced.m4a");

        let expected = enhanced.clone();
        let mut media = MockMediaProcessorTrait::new();
        media
            .expect_black_video()
            .withf(move |audio, _| audio == expected.as_path())
            .times(1)
            .returning(|_, out| touch(out, "mp4"));

        let state = PipelineState::new(&source).with_output(naming::ENHANCE, &enhanced);
        let result = stages(media, MockTranscriberTrait::new()).video(state).unwrap();

        let target = dir.path().join("talk_timestamps.mp4");
        assert_eq!(result.output(naming::VIDEO), Some(target.as_path()));
        assert_eq!(std::fs::read_to_string(target).unwrap(), "mp4");
    }

    #[test]
    fn test_video_failure_keeps_directory_clean() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("talk.m4a");

        let mut media = MockMediaProcessorTrait::new();
        media
            .expect_black_video()
            .returning(|_, out| {
                touch(out, "partial")?;
                Err(ScribeError::Media("encoder crashed".into()))
            });

        let result = stages(media, MockTranscriberTrait::new()).video(PipelineState::new(&source));
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
