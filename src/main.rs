//! mediascribe - resumable media transcription pipeline
//!
//! Normalizes and enhances speech, transcribes it, and writes subtitles,
//! optionally producing a black video and a compressed copy. Every source
//! keeps a ledger next to it so interrupted runs pick up where they stopped.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mediascribe::cli::{Args, Commands, LedgerAction, ProcessArgs};
use mediascribe::config::Config;
use mediascribe::pipeline::{LoggingObserver, StepDecision};
use mediascribe::progress::TerminalProgress;
use mediascribe::workflow::{self, FileReport, RunOptions, RunOutcome, Workflow};

const LOG_FILE: &str = "mediascribe.log";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Process(process) => run_process(config, process).await,
        Commands::Ledger { action } => {
            match action {
                LedgerAction::Show { file } => {
                    let ledger = workflow::show_ledger(&file);
                    println!("Ledger for {}", file.display());
                    println!("  completed:    {}", join_or_none(ledger.completed_steps()));
                    println!("  user skipped: {}", join_or_none(ledger.user_skipped_steps()));
                }
                LedgerAction::Reset { file } => {
                    if workflow::reset_ledger(&file)? {
                        println!("Ledger removed for {}", file.display());
                    } else {
                        println!("No ledger for {}", file.display());
                    }
                }
            }
            Ok(())
        }
        Commands::InitConfig { path } => {
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            config.save_to_file(&path)?;
            println!("Wrote configuration to {}", path.display());
            Ok(())
        }
    }
}

async fn run_process(mut config: Config, process: ProcessArgs) -> Result<()> {
    process.apply_to(&mut config)?;

    let options = RunOptions {
        force: process.force,
        dry_run: process.dry_run,
    };

    let mut workflow = Workflow::new(config)?.with_observer(Arc::new(LoggingObserver));
    if !options.dry_run {
        workflow = workflow.with_observer(Arc::new(TerminalProgress::new()));
    }

    let reports = workflow.process_batch(&process.inputs, options).await?;
    print_reports(&reports);

    let failed = reports.iter().filter(|r| r.result.is_err()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} files failed", failed, reports.len());
    }
    Ok(())
}

fn print_reports(reports: &[FileReport]) {
    for report in reports {
        println!("\n{}", report.path.display());
        match &report.result {
            Ok(RunOutcome::Planned(decisions)) => print_decisions(decisions),
            Ok(RunOutcome::Completed(state)) => {
                println!("{:<12} {:<10} {}", "Output", "Time", "Path");
                println!("{}", "-".repeat(70));
                for (name, path) in state.outputs() {
                    let time = state
                        .timing(name)
                        .map(|t| format_duration(t.as_secs()))
                        .unwrap_or_else(|| "-".to_string());
                    println!("{:<12} {:<10} {}", name, time, path.display());
                }
            }
            Err(e) => println!("  FAILED: {}", e),
        }
    }
}

fn print_decisions(decisions: &[StepDecision]) {
    println!("{:<12} {:<6} {:<14} {}", "Step", "Run", "Reason", "Output");
    println!("{}", "-".repeat(70));
    for decision in decisions {
        println!(
            "{:<12} {:<6} {:<14} {}",
            decision.name,
            if decision.would_run { "yes" } else { "no" },
            decision.reason,
            decision
                .output
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".mediascribe").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, LOG_FILE);
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join(LOG_FILE).display()
    );

    Ok(())
}

/// Format duration in seconds to a human-readable string
fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
