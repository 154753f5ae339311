use std::fmt;
use tracing::{debug, info};

use super::state::PipelineState;

/// Why a step was bypassed during a real run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The operator configured the step off
    UserSkip,
    /// Output already on disk, or the ledger records it
    AlreadyDone,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::UserSkip => "user_skip",
            SkipReason::AlreadyDone => "already_done",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Lifecycle notifications from the orchestrator.
///
/// Every method defaults to a no-op so implementations only pick the events
/// they care about. Implementations must not panic; they run on the thread
/// executing the pipeline and a slow observer slows the stage reporting to it.
pub trait PipelineObserver: Send + Sync {
    fn on_pipeline_start(&self, _step_names: &[String], _state: &PipelineState) {}

    fn on_step_start(&self, _name: &str, _state: &PipelineState) {}

    fn on_step_end(&self, _name: &str, _state: &PipelineState) {}

    fn on_step_skipped(&self, _name: &str, _reason: SkipReason, _state: &PipelineState) {}

    fn on_step_progress(&self, _name: &str, _done: u64, _total: u64) {}

    fn on_pipeline_end(&self, _state: &PipelineState) {}
}

/// Reports lifecycle events through `tracing`
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl PipelineObserver for LoggingObserver {
    fn on_pipeline_start(&self, step_names: &[String], state: &PipelineState) {
        info!(
            "Pipeline for {}: {}",
            state.source().display(),
            step_names.join(" -> ")
        );
    }

    fn on_step_start(&self, name: &str, _state: &PipelineState) {
        info!("Starting step: {}", name);
    }

    fn on_step_end(&self, name: &str, state: &PipelineState) {
        match state.timing(name) {
            Some(elapsed) => info!("Finished step: {} ({:.1}s)", name, elapsed.as_secs_f64()),
            None => info!("Finished step: {}", name),
        }
    }

    fn on_step_skipped(&self, name: &str, reason: SkipReason, _state: &PipelineState) {
        info!("Skipping step: {} ({})", name, reason);
    }

    fn on_step_progress(&self, name: &str, done: u64, total: u64) {
        debug!("Step {} progress: {}/{}", name, done, total);
    }

    fn on_pipeline_end(&self, state: &PipelineState) {
        info!(
            "Pipeline finished for {} with {} outputs",
            state.source().display(),
            state.outputs().len()
        );
    }
}
