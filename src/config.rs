use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use crate::error::{Result, ScribeError};

/// Environment variable consulted when no AssemblyAI key is configured
pub const ASSEMBLY_AI_KEY_ENV: &str = "ASSEMBLY_AI_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub media: MediaConfig,
    pub enhance: EnhanceConfig,
    pub transcriber: TranscriberConfig,
    pub subtitle: SubtitleConfig,
}

/// Which steps the assembler puts into the sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bypass loudness normalization
    pub skip_normalize: bool,
    /// Bypass speech enhancement
    pub skip_enhance: bool,
    /// Generate a black-video MP4 carrying the processed audio
    pub video_output: bool,
    /// Compress to this fraction of the original size (e.g. 0.4)
    pub compress_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_path: String,
    /// AAC bitrate for normalized/enhanced audio (ffmpeg syntax, e.g. "192k")
    pub audio_bitrate: String,
    /// Black video geometry for audio-only sources
    pub video_width: u32,
    pub video_height: u32,
    pub video_fps: u32,
    /// Video encoder used for compression (e.g. libx264, h264_nvenc)
    pub encoder: String,
    /// Audio bitrate reserved in compressed output, in kbps
    pub compress_audio_kbps: u32,
    /// Lower bound for the computed video bitrate, in kbps
    pub min_video_kbps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    /// ffmpeg audio filter chain applied for speech enhancement
    pub filter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriberBackend {
    /// AssemblyAI hosted transcription with speaker labels
    AssemblyAi,
    /// Local whisper.cpp binary
    Whisper,
}

impl std::str::FromStr for TranscriberBackend {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "assemblyai" => Ok(Self::AssemblyAi),
            "whisper" => Ok(Self::Whisper),
            _ => Err(ScribeError::Config(format!(
                "Invalid transcription backend '{}'. Valid backends: assemblyai, whisper",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    pub backend: TranscriberBackend,
    /// Language code; auto-detected when absent
    pub language: Option<String>,
    /// Expected number of speakers; auto when absent
    pub speakers: Option<u32>,
    pub assemblyai: AssemblyAiConfig,
    pub whisper: WhisperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyAiConfig {
    /// API base URL
    pub endpoint: String,
    /// API key; falls back to ASSEMBLY_AI_KEY
    pub api_key: Option<String>,
    /// Seconds between status polls
    pub poll_interval_secs: u64,
    /// Give up after this many seconds of polling
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhisperConfig {
    /// Path to whisper.cpp CLI binary
    pub binary_path: String,
    /// Path to ggml model file
    pub model_path: String,
    pub threads: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SrtMode {
    /// New cue only when the speaker changes
    SpeakerOnly,
    /// Cues follow sentence boundaries within length limits
    Sentences,
}

impl std::str::FromStr for SrtMode {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "speaker-only" => Ok(Self::SpeakerOnly),
            "sentences" => Ok(Self::Sentences),
            _ => Err(ScribeError::Config(format!(
                "Invalid SRT mode '{}'. Valid modes: speaker-only, sentences",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    pub mode: SrtMode,
    /// Soft character limit per cue in sentence mode
    pub max_chars: usize,
    /// Soft duration limit per cue in sentence mode, in seconds
    pub max_duration_secs: f64,
    /// Speaker label -> display name
    pub speaker_names: BTreeMap<String, String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            probe_path: "ffprobe".to_string(),
            audio_bitrate: "192k".to_string(),
            video_width: 854,
            video_height: 480,
            video_fps: 30,
            encoder: "libx264".to_string(),
            compress_audio_kbps: 128,
            min_video_kbps: 100,
        }
    }
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            filter: "highpass=f=80,lowpass=f=8000,afftdn=nf=-25".to_string(),
        }
    }
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            backend: TranscriberBackend::AssemblyAi,
            language: None,
            speakers: None,
            assemblyai: AssemblyAiConfig::default(),
            whisper: WhisperConfig::default(),
        }
    }
}

impl Default for AssemblyAiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.assemblyai.com".to_string(),
            api_key: None,
            poll_interval_secs: 3,
            timeout_secs: 3 * 60 * 60,
        }
    }
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            binary_path: "whisper-cli".to_string(),
            model_path: "models/ggml-large-v3.bin".to_string(),
            threads: 4,
        }
    }
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            mode: SrtMode::SpeakerOnly,
            max_chars: 80,
            max_duration_secs: 10.0,
            speaker_names: BTreeMap::new(),
        }
    }
}

impl AssemblyAiConfig {
    /// Configured key, or the one from the environment
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(key.clone());
        }
        std::env::var(ASSEMBLY_AI_KEY_ENV).map_err(|_| {
            ScribeError::Config(format!(
                "AssemblyAI API key not configured and {} is not set",
                ASSEMBLY_AI_KEY_ENV
            ))
        })
    }
}

/// Parse a speaker map such as `A=Marcel,B=Agustin`
pub fn parse_speaker_map(spec: &str) -> Result<BTreeMap<String, String>> {
    let mut names = BTreeMap::new();
    for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (label, name) = pair.split_once('=').ok_or_else(|| {
            ScribeError::Config(format!("Invalid speaker mapping '{}', expected LABEL=Name", pair))
        })?;
        let (label, name) = (label.trim(), name.trim());
        if label.is_empty() || name.is_empty() {
            return Err(ScribeError::Config(format!(
                "Invalid speaker mapping '{}', expected LABEL=Name",
                pair
            )));
        }
        names.insert(label.to_string(), name.to_string());
    }
    Ok(names)
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScribeError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ScribeError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ScribeError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject values no stage could work with
    pub fn validate(&self) -> Result<()> {
        if let Some(ratio) = self.pipeline.compress_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ScribeError::Config(format!(
                    "compress_ratio must be in (0, 1], got {}",
                    ratio
                )));
            }
        }
        if self.subtitle.max_chars == 0 {
            return Err(ScribeError::Config("subtitle.max_chars must be positive".to_string()));
        }
        Ok(())
    }
}
