use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Callback a stage invokes with `(done, total)` to report progress
#[derive(Clone)]
pub struct ProgressSink(Arc<dyn Fn(u64, u64) + Send + Sync>);

impl ProgressSink {
    pub fn new<F>(report: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        Self(Arc::new(report))
    }

    pub fn report(&self, done: u64, total: u64) {
        (self.0)(done, total)
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressSink")
    }
}

/// Value threaded through every stage.
///
/// Stages take a state by value and hand back a new one; the `with_*`
/// methods consume `self` and return the updated value, so a state seen by
/// one step can never be changed behind its back by another.
#[derive(Debug, Clone)]
pub struct PipelineState {
    source: PathBuf,
    outputs: BTreeMap<String, PathBuf>,
    timings: BTreeMap<String, Duration>,
    progress: Option<ProgressSink>,
    force: bool,
}

impl PipelineState {
    pub fn new<P: Into<PathBuf>>(source: P) -> Self {
        Self {
            source: source.into(),
            outputs: BTreeMap::new(),
            timings: BTreeMap::new(),
            progress: None,
            force: false,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn output(&self, name: &str) -> Option<&Path> {
        self.outputs.get(name).map(PathBuf::as_path)
    }

    pub fn outputs(&self) -> &BTreeMap<String, PathBuf> {
        &self.outputs
    }

    pub fn timing(&self, name: &str) -> Option<Duration> {
        self.timings.get(name).copied()
    }

    pub fn timings(&self) -> &BTreeMap<String, Duration> {
        &self.timings
    }

    /// First output present among `names`, else the source itself
    pub fn latest_audio(&self, names: &[&str]) -> &Path {
        names
            .iter()
            .find_map(|name| self.output(name))
            .unwrap_or(&self.source)
    }

    pub fn progress(&self) -> Option<&ProgressSink> {
        self.progress.as_ref()
    }

    /// Report progress if a sink is bound; no-op otherwise
    pub fn report_progress(&self, done: u64, total: u64) {
        if let Some(sink) = &self.progress {
            sink.report(done, total);
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Record an output; a step running again replaces only its own key
    pub fn with_output<P: Into<PathBuf>>(mut self, name: &str, path: P) -> Self {
        self.outputs.insert(name.to_string(), path.into());
        self
    }

    pub fn with_timing(mut self, name: &str, elapsed: Duration) -> Self {
        self.timings.insert(name.to_string(), elapsed);
        self
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn without_progress(mut self) -> Self {
        self.progress = None;
        self
    }
}
