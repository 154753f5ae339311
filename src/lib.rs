//! mediascribe - resumable media transcription pipeline
//!
//! Takes an audio or video source through normalization, speech enhancement,
//! transcription and subtitle generation (plus optional black-video and
//! compression steps) using ffmpeg and a pluggable transcription backend.
//! A per-source ledger makes interrupted runs resumable.

pub mod cli;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod media;
pub mod pipeline;
pub mod progress;
pub mod stages;
pub mod subtitle;
pub mod transcribe;
pub mod workflow;
