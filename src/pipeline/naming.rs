//! Step names and where each step's output lands.

use std::path::{Path, PathBuf};

pub const NORMALIZE: &str = "normalize";
pub const ENHANCE: &str = "enhance";
pub const TRANSCRIBE: &str = "transcribe";
/// Second output of the transcribe step (plain-text transcript)
pub const TRANSCRIPT: &str = "transcript";
pub const SRT: &str = "srt";
pub const VIDEO: &str = "video";
pub const COMPRESS: &str = "compress";

const OUTPUT_SUFFIXES: &[(&str, &str)] = &[
    (NORMALIZE, "_normalized.m4a"),
    (ENHANCE, "_enhanced.m4a"),
    (TRANSCRIBE, "_timestamps.json"),
    (TRANSCRIPT, "_transcript.txt"),
    (SRT, "_timestamps.srt"),
    (VIDEO, "_timestamps.mp4"),
    (COMPRESS, "_compressed.mp4"),
];

const LEDGER_SUFFIX: &str = "_ledger.json";

pub fn output_suffix(name: &str) -> Option<&'static str> {
    OUTPUT_SUFFIXES
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, suffix)| *suffix)
}

/// `<dir>/<stem><suffix>` for a known output name
pub fn output_path(source: &Path, name: &str) -> Option<PathBuf> {
    output_suffix(name).map(|suffix| sibling(source, suffix))
}

/// Ledger file kept next to the source
pub fn ledger_path(source: &Path) -> PathBuf {
    sibling(source, LEDGER_SUFFIX)
}

/// True for files this pipeline writes next to a source, including
/// intermediates and hidden atomic-write temporaries
pub fn is_generated(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    name.starts_with('.')
        || name.contains("._tmp_")
        || name.ends_with(LEDGER_SUFFIX)
        || OUTPUT_SUFFIXES.iter().any(|(_, suffix)| name.ends_with(suffix))
}

fn sibling(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = source.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{}{}", stem, suffix))
}
