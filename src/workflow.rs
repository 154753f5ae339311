use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Result, ScribeError};
use crate::media::{is_media_file, MediaKind, MediaProcessorFactory, MediaProcessorTrait};
use crate::pipeline::{
    naming, ExecutionLedger, PipelineAssembler, PipelineObserver, PipelineState, StepDecision,
};
use crate::stages::Stages;
use crate::transcribe::{TranscriberFactory, TranscriberTrait};

/// Per-invocation switches from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub force: bool,
    pub dry_run: bool,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(PipelineState),
    Planned(Vec<StepDecision>),
}

/// Result for one input of a batch
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub result: Result<RunOutcome>,
}

pub struct Workflow {
    stages: Arc<Stages>,
    assembler: Arc<PipelineAssembler>,
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let media = MediaProcessorFactory::create_processor(config.media.clone());
        let transcriber = TranscriberFactory::create_transcriber(&config.transcriber, media.clone());
        info!("Using {} transcription backend", transcriber.name());

        Ok(Self::with_collaborators(config, media, transcriber))
    }

    pub fn with_collaborators(
        config: Config,
        media: Arc<dyn MediaProcessorTrait>,
        transcriber: Arc<dyn TranscriberTrait>,
    ) -> Self {
        let stages = Arc::new(Stages::new(media, transcriber, config));
        let assembler = Arc::new(PipelineAssembler::new(stages.clone()));
        Self {
            stages,
            assembler,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.stages.config
    }

    /// Run (or plan) the pipeline for one source file.
    ///
    /// The orchestrator and its stages block, so they run on tokio's
    /// blocking pool.
    pub async fn process_file<P: AsRef<Path>>(&self, input_path: P, options: RunOptions) -> Result<RunOutcome> {
        let input_path = input_path.as_ref().to_path_buf();
        if !input_path.is_file() {
            return Err(ScribeError::FileNotFound(input_path.display().to_string()));
        }

        let stages = self.stages.clone();
        let assembler = self.assembler.clone();
        let observers = self.observers.clone();

        tokio::task::spawn_blocking(move || {
            let kind = MediaKind::detect(stages.media.as_ref(), &input_path);
            info!("Processing {} as {}", input_path.display(), kind.as_str());

            let orchestrator = assembler.assemble(&input_path, kind, observers);
            let state = PipelineState::new(&input_path).with_force(options.force);

            if options.dry_run {
                Ok(RunOutcome::Planned(orchestrator.dry_run(&state)))
            } else {
                orchestrator.run(state).map(RunOutcome::Completed)
            }
        })
        .await
        .map_err(|e| ScribeError::Io(std::io::Error::other(e)))?
    }

    /// Process every input in order; a failing file is logged and the batch continues.
    ///
    /// Real runs need the media tools and fail up front without them; a dry
    /// run only plans and works without them.
    pub async fn process_batch(&self, inputs: &[PathBuf], options: RunOptions) -> Result<Vec<FileReport>> {
        let files = collect_inputs(inputs)?;
        info!("Found {} media files to process", files.len());

        if !options.dry_run {
            self.stages.media.check_availability()?;
        }

        let mut reports = Vec::with_capacity(files.len());
        for path in files {
            let result = self.process_file(&path, options).await;
            match &result {
                Ok(_) => info!("Successfully processed: {}", path.display()),
                Err(e) => warn!("Failed to process {}: {}", path.display(), e),
            }
            reports.push(FileReport { path, result });
        }
        Ok(reports)
    }
}

/// Expand files and directories into the list of sources to process.
///
/// Directories are walked recursively for media files, skipping anything the
/// pipeline itself generated. Explicit file arguments are taken as given.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
        } else if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| is_media_file(p) && !naming::is_generated(p))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            return Err(ScribeError::FileNotFound(input.display().to_string()));
        }
    }

    Ok(files)
}

/// Ledger recorded for a source, empty when none exists
pub fn show_ledger(source: &Path) -> ExecutionLedger {
    ExecutionLedger::load(&naming::ledger_path(source))
}

/// Delete a source's ledger; returns whether one existed
pub fn reset_ledger(source: &Path) -> Result<bool> {
    let path = naming::ledger_path(source);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            info!("Removed ledger {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
