// Orchestration core
//
// - State: immutable value threaded through the stages
// - Step: a named stage plus how to find, skip and restore its output
// - Ledger: persisted record of finished and operator-skipped steps
// - Orchestrator: run / dry-run over an ordered list of steps
// - Assembler: builds that list from configuration and media kind
// - Observer: lifecycle notifications for presentation layers

pub mod assembler;
pub mod ledger;
pub mod naming;
pub mod observer;
pub mod orchestrator;
pub mod state;
pub mod step;

pub use assembler::PipelineAssembler;
pub use ledger::ExecutionLedger;
pub use observer::{LoggingObserver, PipelineObserver, SkipReason};
pub use orchestrator::{DecisionReason, Orchestrator, StepDecision};
pub use state::{PipelineState, ProgressSink};
pub use step::StepDescriptor;
