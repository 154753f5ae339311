use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Mutex;

use crate::pipeline::{PipelineObserver, PipelineState, SkipReason};

const OVERALL_TEMPLATE: &str = "{prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}";
const STEP_TEMPLATE: &str = "  {spinner:.green} {msg:12} [{bar:30.green/white}] {percent:>3}%";

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Terminal display: one bar for the pipeline, one for the running step
pub struct TerminalProgress {
    multi: MultiProgress,
    overall: Mutex<Option<ProgressBar>>,
    step: Mutex<Option<ProgressBar>>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    pub fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            overall: Mutex::new(None),
            step: Mutex::new(None),
        }
    }

    fn with_overall<F: FnOnce(&ProgressBar)>(&self, f: F) {
        if let Ok(guard) = self.overall.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }

    fn finish_step(&self) {
        if let Ok(mut guard) = self.step.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
                self.multi.remove(&bar);
            }
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineObserver for TerminalProgress {
    fn on_pipeline_start(&self, step_names: &[String], state: &PipelineState) {
        let bar = self.multi.add(ProgressBar::new(step_names.len() as u64));
        bar.set_style(style(OVERALL_TEMPLATE));
        bar.set_prefix(
            state
                .source()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        if let Ok(mut guard) = self.overall.lock() {
            *guard = Some(bar);
        }
    }

    fn on_step_start(&self, name: &str, _state: &PipelineState) {
        self.finish_step();
        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style(STEP_TEMPLATE));
        bar.set_message(name.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        if let Ok(mut guard) = self.step.lock() {
            *guard = Some(bar);
        }
        self.with_overall(|overall| overall.set_message(name.to_string()));
    }

    fn on_step_progress(&self, _name: &str, done: u64, total: u64) {
        if let Ok(guard) = self.step.lock() {
            if let Some(bar) = guard.as_ref() {
                bar.set_length(total);
                bar.set_position(done.min(total));
            }
        }
    }

    fn on_step_end(&self, name: &str, _state: &PipelineState) {
        self.finish_step();
        self.with_overall(|overall| {
            overall.inc(1);
            overall.set_message(format!("{} done", name));
        });
    }

    fn on_step_skipped(&self, name: &str, reason: SkipReason, _state: &PipelineState) {
        self.with_overall(|overall| {
            overall.inc(1);
            overall.set_message(format!("{} skipped ({})", name, reason));
        });
    }

    fn on_pipeline_end(&self, _state: &PipelineState) {
        self.finish_step();
        if let Ok(mut guard) = self.overall.lock() {
            if let Some(bar) = guard.take() {
                bar.finish();
            }
        }
    }
}
