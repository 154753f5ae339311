//! Walks an ordered list of steps against the ledger and the pipeline state.
//!
//! For every step the orchestrator decides between running it, skipping it
//! because its work is already accounted for, or skipping it because the
//! operator asked to. The ledger is persisted after each decision that
//! changes it, before the next step starts, so an interrupted run loses at
//! most the step that was in flight.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::Result;
use super::ledger::ExecutionLedger;
use super::observer::{PipelineObserver, SkipReason};
use super::state::{PipelineState, ProgressSink};
use super::step::StepDescriptor;

/// Why a dry run expects a step to run or not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    UserSkip,
    AlreadyDone,
    AlwaysRuns,
    NotDone,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::UserSkip => "user_skip",
            DecisionReason::AlreadyDone => "already_done",
            DecisionReason::AlwaysRuns => "always_runs",
            DecisionReason::NotDone => "not_done",
        }
    }

    pub fn would_run(&self) -> bool {
        matches!(self, DecisionReason::AlwaysRuns | DecisionReason::NotDone)
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<SkipReason> for DecisionReason {
    fn from(reason: SkipReason) -> Self {
        match reason {
            SkipReason::UserSkip => DecisionReason::UserSkip,
            SkipReason::AlreadyDone => DecisionReason::AlreadyDone,
        }
    }
}

/// Outcome of simulating one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepDecision {
    pub name: String,
    pub would_run: bool,
    pub output: Option<PathBuf>,
    pub reason: DecisionReason,
}

pub struct Orchestrator {
    steps: Vec<StepDescriptor>,
    observers: Vec<Arc<dyn PipelineObserver>>,
    ledger_path: PathBuf,
}

impl Orchestrator {
    pub fn new<P: Into<PathBuf>>(steps: Vec<StepDescriptor>, ledger_path: P) -> Self {
        Self {
            steps,
            observers: Vec::new(),
            ledger_path: ledger_path.into(),
        }
    }

    /// Register an observer; observers are notified in registration order
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_observers<I>(mut self, observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn PipelineObserver>>,
    {
        self.observers.extend(observers);
        self
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    /// Execute the pipeline.
    ///
    /// A failing step aborts the sequence and its error is returned wrapped
    /// with the step name; ledger entries written for earlier steps stay.
    /// `on_pipeline_end` fires on both outcomes.
    pub fn run(&self, state: PipelineState) -> Result<PipelineState> {
        let names = self.step_names();
        self.notify(|ob| ob.on_pipeline_start(&names, &state));

        let mut current = state;
        let outcome = self.run_steps(&mut current);

        self.notify(|ob| ob.on_pipeline_end(&current));
        outcome.map(|()| current)
    }

    fn run_steps(&self, state: &mut PipelineState) -> Result<()> {
        let mut ledger = if state.force() {
            info!("Force enabled, rebuilding ledger {}", self.ledger_path.display());
            let ledger = ExecutionLedger::empty();
            ledger.save(&self.ledger_path)?;
            ledger
        } else {
            ExecutionLedger::load(&self.ledger_path)
        };

        for step in &self.steps {
            let name = step.name();

            if step.user_skipped(state) {
                ledger = ledger.mark_user_skipped(name);
                ledger.save(&self.ledger_path)?;
                self.notify(|ob| ob.on_step_skipped(name, SkipReason::UserSkip, state));
                continue;
            }

            let output = step.locate_output(state);
            let on_disk = output.as_deref().filter(|out| output_exists(out));

            if ledger.was_done(name) || on_disk.is_some() {
                if let Some(out) = on_disk {
                    *state = step.restore(state.clone(), out);
                }
                self.notify(|ob| ob.on_step_skipped(name, SkipReason::AlreadyDone, state));
                continue;
            }

            let prepared = state.clone().with_progress(self.progress_sink(name));
            self.notify(|ob| ob.on_step_start(name, &prepared));

            let started = Instant::now();
            let next = step.execute(prepared).map_err(|e| e.in_step(name))?;
            *state = next.without_progress().with_timing(name, started.elapsed());

            ledger = ledger.mark_complete(name);
            ledger.save(&self.ledger_path)?;
            self.notify(|ob| ob.on_step_end(name, state));
        }

        Ok(())
    }

    /// Report what [`run`](Self::run) would do, without running anything.
    ///
    /// Reads the ledger but never writes it, and reads it even when the
    /// state carries `force`, so the report reflects real history.
    pub fn dry_run(&self, state: &PipelineState) -> Vec<StepDecision> {
        let ledger = ExecutionLedger::load(&self.ledger_path);
        let simulated = self.simulate_existing_outputs(state.clone());

        self.steps
            .iter()
            .map(|step| decide(step, &ledger, &simulated))
            .collect()
    }

    /// Fill output references from files that already exist, as skipped
    /// steps would during a real run.
    pub fn simulate_existing_outputs(&self, state: PipelineState) -> PipelineState {
        self.steps.iter().fold(state, |state, step| {
            if step.user_skipped(&state) {
                return state;
            }
            match step.locate_output(&state) {
                Some(out) if output_exists(&out) => step.restore(state, &out),
                _ => state,
            }
        })
    }

    fn notify<F>(&self, event: F)
    where
        F: Fn(&dyn PipelineObserver),
    {
        for observer in &self.observers {
            event(observer.as_ref());
        }
    }

    fn progress_sink(&self, name: &str) -> ProgressSink {
        let observers = self.observers.clone();
        let name = name.to_string();
        ProgressSink::new(move |done, total| {
            for observer in &observers {
                observer.on_step_progress(&name, done, total);
            }
        })
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("steps", &self.step_names())
            .field("observers", &self.observers.len())
            .field("ledger_path", &self.ledger_path)
            .finish()
    }
}

fn decide(step: &StepDescriptor, ledger: &ExecutionLedger, state: &PipelineState) -> StepDecision {
    let output = step.locate_output(state);

    let reason = if step.user_skipped(state) {
        DecisionReason::UserSkip
    } else if ledger.was_done(step.name()) || output.as_deref().is_some_and(output_exists) {
        DecisionReason::AlreadyDone
    } else if step.always_runs() {
        DecisionReason::AlwaysRuns
    } else {
        DecisionReason::NotDone
    };

    StepDecision {
        name: step.name().to_string(),
        would_run: reason.would_run(),
        output,
        reason,
    }
}

/// Existence check that treats an inspection failure as "absent"
pub(crate) fn output_exists(path: &Path) -> bool {
    match path.try_exists() {
        Ok(exists) => exists,
        Err(e) => {
            debug!("Cannot inspect {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScribeError;
    use crate::fsutil::{atomic_output, write_atomic};
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn skips(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter(|e| e.starts_with("skip:"))
                .collect()
        }
    }

    impl PipelineObserver for Recorder {
        fn on_pipeline_start(&self, step_names: &[String], _state: &PipelineState) {
            self.push(format!("pipeline_start:{}", step_names.join(",")));
        }

        fn on_step_start(&self, name: &str, _state: &PipelineState) {
            self.push(format!("start:{}", name));
        }

        fn on_step_end(&self, name: &str, _state: &PipelineState) {
            self.push(format!("end:{}", name));
        }

        fn on_step_skipped(&self, name: &str, reason: SkipReason, _state: &PipelineState) {
            self.push(format!("skip:{}:{}", name, reason));
        }

        fn on_step_progress(&self, name: &str, done: u64, total: u64) {
            self.push(format!("progress:{}:{}/{}", name, done, total));
        }

        fn on_pipeline_end(&self, _state: &PipelineState) {
            self.push("pipeline_end".to_string());
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        source: PathBuf,
        ledger: PathBuf,
        calls: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let source = dir.path().join("talk.wav");
            fs::write(&source, "audio").unwrap();
            let ledger = dir.path().join("talk_ledger.json");
            Self {
                dir,
                source,
                ledger,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn output(&self, name: &str) -> PathBuf {
            self.dir.path().join(format!("{}.txt", name))
        }

        fn state(&self) -> PipelineState {
            PipelineState::new(&self.source)
        }

        /// Step writing `<name>.txt` next to the source
        fn file_step(&self, name: &'static str) -> StepDescriptor {
            let calls = self.calls.clone();
            StepDescriptor::new(name, move |state: PipelineState| {
                calls.fetch_add(1, Ordering::SeqCst);
                let out = output_for(state.source(), name);
                write_atomic(&out, name)?;
                Ok(state.with_output(name, out))
            })
            .with_output(move |state| Some(output_for(state.source(), name)))
            .with_restorer(move |state, out| state.with_output(name, out))
        }

        fn failing_step(&self, name: &'static str) -> StepDescriptor {
            StepDescriptor::new(name, move |state: PipelineState| {
                let out = output_for(state.source(), name);
                atomic_output(&out, |tmp| {
                    fs::write(tmp, "half written")?;
                    Err::<(), _>(ScribeError::Media("encoder interrupted".to_string()))
                })?;
                Ok(state.with_output(name, out))
            })
            .with_output(move |state| Some(output_for(state.source(), name)))
        }

        fn orchestrator(&self, steps: Vec<StepDescriptor>) -> (Orchestrator, Arc<Recorder>) {
            let recorder = Arc::new(Recorder::default());
            let orchestrator = Orchestrator::new(steps, &self.ledger).with_observer(recorder.clone());
            (orchestrator, recorder)
        }

        fn abc(&self) -> Vec<StepDescriptor> {
            vec![self.file_step("a"), self.file_step("b"), self.file_step("c")]
        }

        fn ledger(&self) -> ExecutionLedger {
            ExecutionLedger::load(&self.ledger)
        }

        fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
            fs::read_dir(self.dir.path())
                .unwrap()
                .map(|entry| {
                    let entry = entry.unwrap();
                    (
                        entry.file_name().to_string_lossy().into_owned(),
                        fs::read(entry.path()).unwrap(),
                    )
                })
                .collect()
        }
    }

    fn output_for(source: &Path, name: &str) -> PathBuf {
        source.with_file_name(format!("{}.txt", name))
    }

    #[test]
    fn test_fresh_run_executes_every_step() {
        let fx = Fixture::new();
        let (orchestrator, recorder) = fx.orchestrator(fx.abc());

        let state = orchestrator.run(fx.state()).unwrap();

        assert_eq!(fx.ledger().completed_steps(), ["a", "b", "c"]);
        for name in ["a", "b", "c"] {
            assert!(fx.output(name).exists());
            assert_eq!(state.output(name), Some(fx.output(name).as_path()));
            assert!(state.timing(name).is_some());
        }
        assert_eq!(
            recorder.events(),
            vec![
                "pipeline_start:a,b,c",
                "start:a",
                "end:a",
                "start:b",
                "end:b",
                "start:c",
                "end:c",
                "pipeline_end",
            ]
        );
    }

    #[test]
    fn test_existing_output_is_skipped_and_restored() {
        let fx = Fixture::new();
        fs::write(fx.output("b"), "manual").unwrap();
        let (orchestrator, recorder) = fx.orchestrator(fx.abc());

        let state = orchestrator.run(fx.state()).unwrap();

        assert_eq!(recorder.skips(), vec!["skip:b:already_done"]);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fx.ledger().completed_steps(), ["a", "c"]);
        assert_eq!(state.output("b"), Some(fx.output("b").as_path()));
        assert_eq!(fs::read_to_string(fx.output("b")).unwrap(), "manual");
        assert!(state.timing("b").is_none());
    }

    #[test]
    fn test_failure_stops_sequence_and_keeps_prior_ledger() {
        let fx = Fixture::new();
        let steps = vec![fx.file_step("a"), fx.failing_step("b"), fx.file_step("c")];
        let (orchestrator, recorder) = fx.orchestrator(steps);

        let err = orchestrator.run(fx.state()).unwrap_err();

        assert_eq!(err.step_name(), Some("b"));
        assert_eq!(fx.ledger().completed_steps(), ["a"]);
        assert!(!fx.output("b").exists());
        assert!(!fx.output("c").exists());
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);

        let files: Vec<String> = fx.snapshot().into_keys().collect();
        assert_eq!(files, vec!["a.txt", "talk.wav", "talk_ledger.json"]);

        let events = recorder.events();
        assert_eq!(events.last().map(String::as_str), Some("pipeline_end"));
        assert!(!events.iter().any(|e| e == "start:c"));
    }

    #[test]
    fn test_resume_after_failure_continues_from_failed_step() {
        let fx = Fixture::new();
        let (failing, _) = fx.orchestrator(vec![fx.file_step("a"), fx.failing_step("b"), fx.file_step("c")]);
        assert!(failing.run(fx.state()).is_err());

        let (orchestrator, recorder) = fx.orchestrator(fx.abc());
        let state = orchestrator.run(fx.state()).unwrap();

        assert_eq!(recorder.skips(), vec!["skip:a:already_done"]);
        assert_eq!(fx.ledger().completed_steps(), ["a", "b", "c"]);
        assert_eq!(state.output("a"), Some(fx.output("a").as_path()));
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let fx = Fixture::new();
        let (orchestrator, _) = fx.orchestrator(fx.abc());
        let first = orchestrator.run(fx.state()).unwrap();
        let files_after_first = fx.snapshot();

        let (orchestrator, recorder) = fx.orchestrator(fx.abc());
        let second = orchestrator.run(fx.state()).unwrap();

        assert_eq!(fx.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            recorder.skips(),
            vec!["skip:a:already_done", "skip:b:already_done", "skip:c:already_done"]
        );
        assert_eq!(first.outputs(), second.outputs());
        assert_eq!(fx.snapshot(), files_after_first);
    }

    #[test]
    fn test_force_ignores_history_but_not_disk() {
        let fx = Fixture::new();
        for name in ["a", "b", "c"] {
            fs::write(fx.output(name), name).unwrap();
        }
        ExecutionLedger::empty()
            .mark_complete("a")
            .mark_user_skipped("old")
            .save(&fx.ledger)
            .unwrap();
        let (orchestrator, recorder) = fx.orchestrator(fx.abc());

        let state = orchestrator.run(fx.state().with_force(true)).unwrap();

        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.skips().len(), 3);
        assert_eq!(fx.ledger(), ExecutionLedger::empty());
        assert_eq!(state.outputs().len(), 3);
    }

    #[test]
    fn test_force_reruns_steps_recorded_only_in_ledger() {
        let fx = Fixture::new();
        ExecutionLedger::empty()
            .mark_complete("a")
            .mark_complete("b")
            .save(&fx.ledger)
            .unwrap();

        let (orchestrator, _) = fx.orchestrator(fx.abc());
        orchestrator.run(fx.state()).unwrap();
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);

        let (orchestrator, _) = fx.orchestrator(fx.abc());
        fs::remove_file(fx.output("c")).unwrap();
        orchestrator.run(fx.state().with_force(true)).unwrap();
        assert_eq!(fx.calls.load(Ordering::SeqCst), 4);
        assert_eq!(fx.ledger().completed_steps(), ["a", "b", "c"]);
    }

    #[test]
    fn test_user_skip_wins_over_existing_output() {
        let fx = Fixture::new();
        fs::write(fx.output("b"), "exists").unwrap();
        let steps = vec![
            fx.file_step("a"),
            fx.file_step("b").with_user_skip(|_| true),
            fx.file_step("c"),
        ];
        let (orchestrator, recorder) = fx.orchestrator(steps);

        let decisions = orchestrator.dry_run(&fx.state());
        assert_eq!(decisions[1].reason, DecisionReason::UserSkip);
        assert!(!decisions[1].would_run);

        let state = orchestrator.run(fx.state()).unwrap();
        assert_eq!(recorder.skips(), vec!["skip:b:user_skip"]);
        assert!(state.output("b").is_none());
        assert_eq!(fx.ledger().user_skipped_steps(), ["b"]);
        assert_eq!(fx.ledger().completed_steps(), ["a", "c"]);
    }

    #[test]
    fn test_step_without_locator_runs_until_recorded() {
        let fx = Fixture::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let probe = StepDescriptor::new("probe", move |state| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(state)
        });
        let (orchestrator, _) = fx.orchestrator(vec![probe]);

        assert_eq!(orchestrator.dry_run(&fx.state())[0].reason, DecisionReason::AlwaysRuns);
        orchestrator.run(fx.state()).unwrap();
        orchestrator.run(fx.state()).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.dry_run(&fx.state())[0].reason, DecisionReason::AlreadyDone);
    }

    #[test]
    fn test_progress_is_routed_to_observers_with_step_name() {
        let fx = Fixture::new();
        let step = StepDescriptor::new("encode", |state: PipelineState| {
            state.report_progress(1, 2);
            state.report_progress(2, 2);
            Ok(state)
        });
        let (orchestrator, recorder) = fx.orchestrator(vec![step]);

        let state = orchestrator.run(fx.state()).unwrap();

        let events = recorder.events();
        assert!(events.contains(&"progress:encode:1/2".to_string()));
        assert!(events.contains(&"progress:encode:2/2".to_string()));
        assert!(state.progress().is_none());
    }

    #[test]
    fn test_observers_notified_in_registration_order() {
        struct Tagged(&'static str, Arc<Mutex<Vec<String>>>);
        impl PipelineObserver for Tagged {
            fn on_step_start(&self, name: &str, _state: &PipelineState) {
                self.1.lock().unwrap().push(format!("{}:{}", self.0, name));
            }
        }

        let fx = Fixture::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = Orchestrator::new(vec![fx.file_step("a"), fx.file_step("b")], &fx.ledger)
            .with_observers([
                Arc::new(Tagged("first", log.clone())) as Arc<dyn PipelineObserver>,
                Arc::new(Tagged("second", log.clone())),
            ]);

        orchestrator.run(fx.state()).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:a", "second:a", "first:b", "second:b"]
        );
    }

    #[test]
    fn test_dry_run_fresh_source() {
        let fx = Fixture::new();
        let (orchestrator, recorder) = fx.orchestrator(fx.abc());
        let before = fx.snapshot();

        let decisions = orchestrator.dry_run(&fx.state());

        assert_eq!(
            decisions,
            vec![
                StepDecision {
                    name: "a".to_string(),
                    would_run: true,
                    output: Some(fx.output("a")),
                    reason: DecisionReason::NotDone,
                },
                StepDecision {
                    name: "b".to_string(),
                    would_run: true,
                    output: Some(fx.output("b")),
                    reason: DecisionReason::NotDone,
                },
                StepDecision {
                    name: "c".to_string(),
                    would_run: true,
                    output: Some(fx.output("c")),
                    reason: DecisionReason::NotDone,
                },
            ]
        );
        assert_eq!(fx.snapshot(), before);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_dry_run_never_touches_disk_and_ignores_force() {
        let fx = Fixture::new();
        fs::write(fx.output("a"), "a").unwrap();
        ExecutionLedger::empty()
            .mark_complete("b")
            .save(&fx.ledger)
            .unwrap();
        let steps = vec![
            fx.file_step("a"),
            fx.file_step("b"),
            fx.file_step("c").with_user_skip(|_| false),
        ];
        let (orchestrator, _) = fx.orchestrator(steps);
        let before = fx.snapshot();

        let decisions = orchestrator.dry_run(&fx.state().with_force(true));

        let reasons: Vec<DecisionReason> = decisions.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![DecisionReason::AlreadyDone, DecisionReason::AlreadyDone, DecisionReason::NotDone]
        );
        assert_eq!(fx.snapshot(), before);
    }

    #[test]
    fn test_dry_run_uses_existing_outputs_for_later_locators() {
        let fx = Fixture::new();
        fs::write(fx.output("a"), "a").unwrap();
        let derived = StepDescriptor::new("derived", Ok).with_output(|state| {
            state
                .output("a")
                .map(|a| a.with_file_name("derived_from_a.txt"))
        });
        let (orchestrator, _) = fx.orchestrator(vec![fx.file_step("a"), derived]);

        let decisions = orchestrator.dry_run(&fx.state());

        assert_eq!(decisions[1].output, Some(fx.dir.path().join("derived_from_a.txt")));
        assert_eq!(decisions[1].reason, DecisionReason::NotDone);
    }

    #[test]
    fn test_dry_run_treats_uninspectable_output_as_not_done() {
        let fx = Fixture::new();
        let plain = fx.dir.path().join("plain.txt");
        fs::write(&plain, "not a directory").unwrap();
        let nested = plain.join("out.txt");
        let step = StepDescriptor::new("nested", Ok).with_output(move |_| Some(nested.clone()));
        let (orchestrator, _) = fx.orchestrator(vec![step]);

        assert!(!output_exists(&plain.join("out.txt")));
        let decisions = orchestrator.dry_run(&fx.state());

        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].reason, DecisionReason::NotDone);
        assert!(decisions[0].would_run);
    }

    #[test]
    fn test_malformed_ledger_does_not_abort_run() {
        let fx = Fixture::new();
        fs::write(&fx.ledger, "{{{").unwrap();
        let (orchestrator, _) = fx.orchestrator(fx.abc());

        orchestrator.run(fx.state()).unwrap();

        assert_eq!(fx.ledger().completed_steps(), ["a", "b", "c"]);
    }
}
