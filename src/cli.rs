use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{parse_speaker_map, Config, SrtMode, TranscriberBackend};
use crate::error::Result;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the transcription pipeline over files or directories
    Process(ProcessArgs),

    /// Inspect or clear the execution ledger of a source file
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },

    /// Write a configuration file with every default filled in
    InitConfig {
        /// Destination path
        #[arg(default_value = "config.toml")]
        path: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum LedgerAction {
    /// Print completed and operator-skipped steps
    Show {
        /// Source media file
        file: PathBuf,
    },

    /// Delete the ledger so the next run starts from disk state only
    Reset {
        /// Source media file
        file: PathBuf,
    },
}

#[derive(ClapArgs, Debug, Default)]
pub struct ProcessArgs {
    /// Input media files or directories
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Ignore ledger history (existing outputs are still honored)
    #[arg(long)]
    pub force: bool,

    /// Show what would run without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip loudness normalization
    #[arg(long)]
    pub no_normalize: bool,

    /// Skip speech enhancement
    #[arg(long)]
    pub no_enhance: bool,

    /// Also produce a black video with the processed audio
    #[arg(long)]
    pub video_output: bool,

    /// Compress to this fraction of the input size (0 < ratio <= 1)
    #[arg(long, value_name = "RATIO")]
    pub compress: Option<f64>,

    /// Transcription backend (assemblyai, whisper)
    #[arg(long)]
    pub backend: Option<String>,

    /// Language code; auto-detected when omitted
    #[arg(short, long)]
    pub language: Option<String>,

    /// Expected number of speakers
    #[arg(long)]
    pub speakers: Option<u32>,

    /// Subtitle grouping (speaker-only, sentences)
    #[arg(long)]
    pub srt_mode: Option<String>,

    /// Speaker display names, e.g. A=Marcel,B=Agustin
    #[arg(long, value_name = "MAP")]
    pub speakers_map: Option<String>,

    /// AssemblyAI API key (otherwise config or ASSEMBLY_AI_KEY)
    #[arg(long)]
    pub assemblyai_api_key: Option<String>,
}

impl ProcessArgs {
    /// Layer command-line flags over the loaded configuration
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        if self.no_normalize {
            config.pipeline.skip_normalize = true;
        }
        if self.no_enhance {
            config.pipeline.skip_enhance = true;
        }
        if self.video_output {
            config.pipeline.video_output = true;
        }
        if let Some(ratio) = self.compress {
            config.pipeline.compress_ratio = Some(ratio);
        }
        if let Some(backend) = &self.backend {
            config.transcriber.backend = backend.parse::<TranscriberBackend>()?;
        }
        if let Some(language) = &self.language {
            config.transcriber.language = Some(language.clone());
        }
        if let Some(speakers) = self.speakers {
            config.transcriber.speakers = Some(speakers);
        }
        if let Some(mode) = &self.srt_mode {
            config.subtitle.mode = mode.parse::<SrtMode>()?;
        }
        if let Some(map) = &self.speakers_map {
            config.subtitle.speaker_names.extend(parse_speaker_map(map)?);
        }
        if let Some(key) = &self.assemblyai_api_key {
            config.transcriber.assemblyai.api_key = Some(key.clone());
        }
        config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(argv: &[&str]) -> ProcessArgs {
        let args = Args::try_parse_from(argv).unwrap();
        match args.command {
            Commands::Process(p) => p,
            _ => panic!("expected process"),
        }
    }

    #[test]
    fn test_parse_process_flags() {
        let p = process(&["mediascribe", "process", "a.mp4", "dir", "--force", "--dry-run", "--compress", "0.3"]);
        assert_eq!(p.inputs, vec![PathBuf::from("a.mp4"), PathBuf::from("dir")]);
        assert!(p.force && p.dry_run);
        assert_eq!(p.compress, Some(0.3));
    }

    #[test]
    fn test_process_requires_input() {
        assert!(Args::try_parse_from(["mediascribe", "process"]).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let p = process(&[
            "mediascribe", "process", "a.m4a",
            "--no-enhance", "--backend", "whisper", "--srt-mode", "sentences",
            "--speakers-map", "A=Ana", "--speakers", "3", "-l", "es",
        ]);
        let mut config = Config::default();
        p.apply_to(&mut config).unwrap();

        assert!(config.pipeline.skip_enhance);
        assert!(!config.pipeline.skip_normalize);
        assert_eq!(config.transcriber.backend, TranscriberBackend::Whisper);
        assert_eq!(config.subtitle.mode, SrtMode::Sentences);
        assert_eq!(config.subtitle.speaker_names.get("A").map(String::as_str), Some("Ana"));
        assert_eq!(config.transcriber.speakers, Some(3));
        assert_eq!(config.transcriber.language.as_deref(), Some("es"));
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut config = Config::default();
        let p = ProcessArgs {
            backend: Some("nope".into()),
            ..ProcessArgs::default()
        };
        assert!(p.apply_to(&mut config).is_err());

        let p = ProcessArgs {
            compress: Some(1.5),
            ..ProcessArgs::default()
        };
        assert!(p.apply_to(&mut Config::default()).is_err());
    }

    #[test]
    fn test_parse_ledger_commands() {
        let args = Args::try_parse_from(["mediascribe", "ledger", "reset", "talk.m4a"]).unwrap();
        assert!(matches!(
            args.command,
            Commands::Ledger { action: LedgerAction::Reset { .. } }
        ));
    }
}
