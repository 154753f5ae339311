use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, ScribeError};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi", "webm", "m4v", "flv", "wmv", "ts"];
const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "aac", "flac", "ogg", "opus", "wma"];

/// What ffprobe reports about a file
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub size_bytes: u64,
    pub video: Option<VideoStream>,
    pub has_audio: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoStream {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    #[serde(default)]
    disposition: ProbeDisposition,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
}

impl MediaInfo {
    /// Parse `ffprobe -print_format json -show_format -show_streams` output
    pub fn from_probe_json(path: &Path, json: &str) -> Result<Self> {
        let probe: ProbeOutput = serde_json::from_str(json)?;

        let format = probe.format.ok_or_else(|| {
            ScribeError::Media(format!("No format section in probe of {}", path.display()))
        })?;

        let duration_secs = format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let size_bytes = match format.size.as_deref().and_then(|s| s.parse::<u64>().ok()) {
            Some(size) => size,
            None => std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        };

        // Cover art shows up as a video stream; it does not make a file a video.
        let video = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video") && s.disposition.attached_pic == 0)
            .map(|s| VideoStream {
                width: s.width.unwrap_or(0),
                height: s.height.unwrap_or(0),
                fps: s.avg_frame_rate.as_deref().map(parse_frame_rate).unwrap_or(0.0),
            });

        let has_audio = probe
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio"));

        Ok(Self {
            path: path.to_path_buf(),
            duration_secs,
            size_bytes,
            video,
            has_audio,
        })
    }

    pub fn is_video(&self) -> bool {
        self.video.is_some()
    }
}

/// "30000/1001" -> 29.97
fn parse_frame_rate(rate: &str) -> f64 {
    match rate.split_once('/') {
        Some((num, den)) => match (num.parse::<f64>(), den.parse::<f64>()) {
            (Ok(n), Ok(d)) if d > 0.0 => n / d,
            _ => 0.0,
        },
        None => rate.parse().unwrap_or(0.0),
    }
}

/// Audio-only or video input; decides which steps a pipeline gets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }

    /// Probe first, then the extension. Unknown files are treated as audio.
    pub fn detect(media: &dyn super::MediaProcessorTrait, path: &Path) -> Self {
        match media.probe(path) {
            Ok(info) => {
                if info.is_video() {
                    MediaKind::Video
                } else {
                    MediaKind::Audio
                }
            }
            Err(e) => {
                debug!("Probe failed for {}, using extension: {}", path.display(), e);
                Self::from_extension(path).unwrap_or(MediaKind::Audio)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// Whether a path looks like something the pipeline can process
pub fn is_media_file(path: &Path) -> bool {
    MediaKind::from_extension(path).is_some()
}

/// Video bitrate (kbps) that lands the output near `ratio` of the input size.
///
/// `total = size * ratio * 8 / (duration * 1000)`, minus the audio share,
/// floored at `min_kbps`.
pub fn calculate_video_bitrate(info: &MediaInfo, ratio: f64, audio_kbps: u32, min_kbps: u32) -> Result<u32> {
    if info.duration_secs <= 0.0 {
        return Err(ScribeError::Media(format!(
            "Cannot compute bitrate: unknown duration for {}",
            info.path.display()
        )));
    }

    let total_kbps = info.size_bytes as f64 * ratio * 8.0 / (info.duration_secs * 1000.0);
    let audio = if info.has_audio { audio_kbps as f64 } else { 0.0 };
    let video_kbps = (total_kbps - audio).floor();

    Ok(if video_kbps < min_kbps as f64 {
        min_kbps
    } else {
        video_kbps as u32
    })
}
