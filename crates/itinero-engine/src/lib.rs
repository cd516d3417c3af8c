pub mod merge;
pub mod parallel;
pub mod runner;
pub mod sequential;
pub mod stage;
pub mod trace;

pub use parallel::{Branch, ParallelGroup};
pub use runner::{WorkflowOutcome, WorkflowReport, WorkflowRunner};
pub use sequential::SequentialGroup;
pub use stage::{LeafStage, Stage, StageFailure};
pub use trace::{StageKind, TraceEvent, TraceOutcome, TracePhase};
