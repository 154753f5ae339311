use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;
use super::state::PipelineState;

/// Stage body: receives a state, returns the next one or fails
pub type TransformFn = Box<dyn Fn(PipelineState) -> Result<PipelineState> + Send + Sync>;
/// Where the step's output would land for a given state
pub type OutputLocatorFn = Box<dyn Fn(&PipelineState) -> Option<PathBuf> + Send + Sync>;
/// True when the operator asked to bypass the step
pub type UserSkipFn = Box<dyn Fn(&PipelineState) -> bool + Send + Sync>;
/// Repopulates state fields when the step is skipped because its output exists
pub type StateRestorerFn = Box<dyn Fn(PipelineState, &Path) -> PipelineState + Send + Sync>;

/// One named step of a pipeline, assembled once with everything it needs
/// captured in its closures.
pub struct StepDescriptor {
    name: String,
    transform: TransformFn,
    output_locator: Option<OutputLocatorFn>,
    user_skip: Option<UserSkipFn>,
    state_restorer: Option<StateRestorerFn>,
}

impl StepDescriptor {
    pub fn new<F>(name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(PipelineState) -> Result<PipelineState> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            transform: Box::new(transform),
            output_locator: None,
            user_skip: None,
            state_restorer: None,
        }
    }

    pub fn with_output<F>(mut self, locator: F) -> Self
    where
        F: Fn(&PipelineState) -> Option<PathBuf> + Send + Sync + 'static,
    {
        self.output_locator = Some(Box::new(locator));
        self
    }

    pub fn with_user_skip<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PipelineState) -> bool + Send + Sync + 'static,
    {
        self.user_skip = Some(Box::new(predicate));
        self
    }

    pub fn with_restorer<F>(mut self, restorer: F) -> Self
    where
        F: Fn(PipelineState, &Path) -> PipelineState + Send + Sync + 'static,
    {
        self.state_restorer = Some(Box::new(restorer));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// No output to find and nothing to skip: the step runs every time
    /// its ledger entry is absent.
    pub fn always_runs(&self) -> bool {
        self.output_locator.is_none() && self.user_skip.is_none()
    }

    pub fn has_restorer(&self) -> bool {
        self.state_restorer.is_some()
    }

    pub fn user_skipped(&self, state: &PipelineState) -> bool {
        self.user_skip.as_ref().is_some_and(|skip| skip(state))
    }

    pub fn locate_output(&self, state: &PipelineState) -> Option<PathBuf> {
        self.output_locator.as_ref().and_then(|locate| locate(state))
    }

    pub fn restore(&self, state: PipelineState, output: &Path) -> PipelineState {
        match &self.state_restorer {
            Some(restore) => restore(state, output),
            None => state,
        }
    }

    pub fn execute(&self, state: PipelineState) -> Result<PipelineState> {
        (self.transform)(state)
    }
}

impl fmt::Debug for StepDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDescriptor")
            .field("name", &self.name)
            .field("output_locator", &self.output_locator.is_some())
            .field("user_skip", &self.user_skip.is_some())
            .field("state_restorer", &self.state_restorer.is_some())
            .finish()
    }
}
