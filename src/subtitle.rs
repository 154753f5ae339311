use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{SrtMode, SubtitleConfig};
use crate::transcribe::Word;

/// One subtitle entry, times in milliseconds
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub text: String,
    pub start: u64,
    pub end: u64,
    pub speaker: Option<String>,
}

/// Words accumulated for the cue being built
struct Pending<'a> {
    speaker: Option<String>,
    words: Vec<&'a Word>,
}

impl<'a> Pending<'a> {
    fn new(speaker: Option<String>) -> Self {
        Self { speaker, words: Vec::new() }
    }

    fn starting_with(word: &'a Word) -> Self {
        Self {
            speaker: word.speaker.clone(),
            words: vec![word],
        }
    }

    fn text_with(&self, next: &Word) -> String {
        self.words
            .iter()
            .map(|w| w.text.trim())
            .chain(std::iter::once(next.text.trim()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn duration_with(&self, next: &Word) -> u64 {
        self.words
            .first()
            .map(|first| next.end.saturating_sub(first.start))
            .unwrap_or(0)
    }

    fn flush(&mut self, cues: &mut Vec<Cue>) {
        if let (Some(first), Some(last)) = (self.words.first(), self.words.last()) {
            cues.push(Cue {
                text: self.words.iter().map(|w| w.text.trim()).collect::<Vec<_>>().join(" "),
                start: first.start,
                end: last.end,
                speaker: self.speaker.clone(),
            });
        }
        self.words.clear();
    }
}

fn trailing_punctuation(text: &str) -> Option<char> {
    text.trim_end()
        .trim_end_matches(['"', '\'', ')'])
        .chars()
        .last()
}

/// Ends with `. ! ? ;`, ignoring closing quotes and parentheses
pub fn is_sentence_end(text: &str) -> bool {
    matches!(trailing_punctuation(text), Some('.' | '!' | '?' | ';'))
}

/// Ends with `,` or `:`
pub fn is_strong_pause(text: &str) -> bool {
    matches!(trailing_punctuation(text), Some(',' | ':'))
}

/// True when a word opens a new speaker turn. Words without a speaker label
/// stay with the current cue.
fn speaker_changes(pending: &Pending<'_>, word: &Word) -> bool {
    word.speaker.is_some() && word.speaker != pending.speaker
}

fn usable(words: &[Word]) -> impl Iterator<Item = &Word> {
    words.iter().filter(|w| !w.text.trim().is_empty())
}

/// New cue on every speaker change, nothing else
pub fn group_by_speaker(words: &[Word]) -> Vec<Cue> {
    let mut cues = Vec::new();
    let mut pending = Pending::new(words.first().and_then(|w| w.speaker.clone()));

    for word in usable(words) {
        if speaker_changes(&pending, word) {
            pending.flush(&mut cues);
            pending = Pending::starting_with(word);
        } else {
            pending.words.push(word);
        }
    }
    pending.flush(&mut cues);
    cues
}

/// Sentence-shaped cues.
///
/// Break priority: speaker change, then sentence end, then a strong pause
/// once `max_chars`/`max_duration_ms` is exceeded, then a hard cut at 1.5x
/// either limit.
pub fn group_by_sentences(words: &[Word], max_chars: usize, max_duration_ms: u64) -> Vec<Cue> {
    let hard_chars = max_chars * 3 / 2;
    let hard_duration = max_duration_ms * 3 / 2;

    let mut cues = Vec::new();
    let mut pending = Pending::new(words.first().and_then(|w| w.speaker.clone()));

    for word in usable(words) {
        if speaker_changes(&pending, word) {
            pending.flush(&mut cues);
            pending = Pending::starting_with(word);
            continue;
        }

        let chars = pending.text_with(word).chars().count();
        let duration = pending.duration_with(word);

        if is_sentence_end(&word.text) {
            pending.words.push(word);
            pending.flush(&mut cues);
            continue;
        }

        let over_soft = chars > max_chars || duration > max_duration_ms;
        let pause_before = pending.words.last().is_some_and(|w| is_strong_pause(&w.text));
        if over_soft && pause_before {
            pending.flush(&mut cues);
            pending.words.push(word);
            continue;
        }

        if chars > hard_chars || duration > hard_duration {
            pending.flush(&mut cues);
        }
        pending.words.push(word);
    }
    pending.flush(&mut cues);
    cues
}

pub fn group_words(words: &[Word], config: &SubtitleConfig) -> Vec<Cue> {
    let cues = match config.mode {
        SrtMode::SpeakerOnly => group_by_speaker(words),
        SrtMode::Sentences => group_by_sentences(
            words,
            config.max_chars,
            (config.max_duration_secs * 1000.0) as u64,
        ),
    };
    debug!("Grouped {} words into {} cues", words.len(), cues.len());
    cues
}

/// Render cues as SRT, prefixing each with `[Speaker]` when labeled
pub fn render_srt(cues: &[Cue], speaker_names: &BTreeMap<String, String>) -> String {
    let mut srt_content = String::new();

    for (index, cue) in cues.iter().enumerate() {
        let text = match cue.speaker.as_deref().filter(|s| !s.is_empty()) {
            Some(label) => {
                let name = speaker_names.get(label).map(String::as_str).unwrap_or(label);
                format!("[{}] {}", name, cue.text)
            }
            None => cue.text.clone(),
        };

        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_time(cue.start),
            format_srt_time(cue.end),
            text
        ));
    }

    srt_content
}

/// Format milliseconds to SRT time format (HH:MM:SS,mmm)
pub fn format_srt_time(total_milliseconds: u64) -> String {
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}
