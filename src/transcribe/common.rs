use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, ScribeError};

/// One recognized word with millisecond timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: u64,
    pub end: u64,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub speaker: Option<String>,
}

impl Word {
    pub fn new(text: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            confidence: None,
            speaker: None,
        }
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }
}

/// Backend-independent transcription result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub words: Vec<Word>,
    pub language: Option<String>,
}

/// Knobs passed to every backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscribeOptions {
    /// ISO code; `None` asks the backend to detect it
    pub language: Option<String>,
    pub speakers: Option<u32>,
}

/// A run of consecutive words from the same speaker
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub speaker: Option<String>,
    pub start: u64,
    pub end: u64,
    pub text: String,
}

impl Transcript {
    pub fn new(words: Vec<Word>) -> Self {
        Self { words, language: None }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Word list as pretty JSON, the on-disk `_timestamps.json` format
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.words)?)
    }

    pub fn utterances(&self) -> Vec<Utterance> {
        let mut utterances: Vec<Utterance> = Vec::new();
        for word in &self.words {
            match utterances.last_mut() {
                Some(current) if current.speaker == word.speaker => {
                    current.end = word.end;
                    current.text.push(' ');
                    current.text.push_str(word.text.trim());
                }
                _ => utterances.push(Utterance {
                    speaker: word.speaker.clone(),
                    start: word.start,
                    end: word.end,
                    text: word.text.trim().to_string(),
                }),
            }
        }
        utterances
    }

    /// Plain-text transcript, one `[mm:ss] Speaker X: text` line per turn
    pub fn render_text(&self) -> String {
        self.utterances()
            .iter()
            .map(|u| match &u.speaker {
                Some(speaker) => format!("[{}] Speaker {}: {}", format_clock(u.start), speaker, u.text),
                None => format!("[{}] {}", format_clock(u.start), u.text),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// `mm:ss`, or `hh:mm:ss` past the first hour
pub fn format_clock(ms: u64) -> String {
    let total = ms / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Read a `_timestamps.json` word list
pub fn load_words(path: &Path) -> Result<Vec<Word>> {
    if !path.exists() {
        return Err(ScribeError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    let words: Vec<Word> = serde_json::from_str(&content)?;
    Ok(words)
}
