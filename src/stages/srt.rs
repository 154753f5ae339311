use tracing::info;

use crate::error::{Result, ScribeError};
use crate::fsutil::write_atomic;
use crate::pipeline::{naming, PipelineState};
use crate::subtitle::{group_words, render_srt};
use crate::transcribe::load_words;
use super::{step_output, Stages};

impl Stages {
    /// Word list -> grouped cues -> `_timestamps.srt`
    pub fn srt(&self, state: PipelineState) -> Result<PipelineState> {
        let words_path = state
            .output(naming::TRANSCRIBE)
            .ok_or_else(|| ScribeError::MissingInput(format!("{} needs {} output", naming::SRT, naming::TRANSCRIBE)))?
            .to_path_buf();
        let target = step_output(&state, naming::SRT)?;

        let words = load_words(&words_path)?;
        let cues = group_words(&words, &self.config.subtitle);
        info!("Writing {} subtitle cues to {}", cues.len(), target.display());

        write_atomic(&target, render_srt(&cues, &self.config.subtitle.speaker_names))?;
        Ok(state.with_output(naming::SRT, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::media::MockMediaProcessorTrait;
    use crate::stages::test_support::{stages, stages_with_config};
    use crate::transcribe::{MockTranscriberTrait, Transcript, Word};

    #[test]
    fn test_srt_requires_transcription() {
        let result = stages(MockMediaProcessorTrait::new(), MockTranscriberTrait::new())
            .srt(PipelineState::new("/m/talk.m4a"));
        assert!(matches!(result, Err(ScribeError::MissingInput(_))));
    }

    #[test]
    fn test_srt_renders_named_speakers() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("talk.m4a");
        let json = dir.path().join("talk_timestamps.json");
        let transcript = Transcript::new(vec![
            Word::new("Hola.", 0, 1200).with_speaker("A"),
            Word::new("Hi.", 1300, 1800).with_speaker("B"),
        ]);
        std::fs::write(&json, transcript.to_json().unwrap()).unwrap();

        let mut config = Config::default();
        config.subtitle.speaker_names.insert("A".into(), "Marcel".into());
        let stages = stages_with_config(MockMediaProcessorTrait::new(), MockTranscriberTrait::new(), config);

        let result = stages
            .srt(PipelineState::new(&source).with_output(naming::TRANSCRIBE, &json))
            .unwrap();

        let srt_path = dir.path().join("talk_timestamps.srt");
        assert_eq!(result.output(naming::SRT), Some(srt_path.as_path()));
        let srt = std::fs::read_to_string(&srt_path).unwrap();
        assert!(srt.contains("00:00:00,000 --> 00:00:01,200\n[Marcel] Hola."));
        assert!(srt.contains("[B] Hi."));
    }
}
