use chrono::{DateTime, Utc};
use serde::Serialize;

/// Which stage variant produced a trace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Leaf,
    Sequential,
    Parallel,
}

/// Entry or exit of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TracePhase {
    Enter,
    Exit,
}

/// Exit outcome of a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum TraceOutcome {
    Success,
    Failure { error: String },
}

/// One entry in the execution trace.
///
/// `path` is the slash-joined stage path from the root (composers prefix
/// their name onto child events as results propagate upward).
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub path: String,
    pub kind: StageKind,
    pub phase: TracePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TraceOutcome>,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl TraceEvent {
    pub fn enter(path: impl Into<String>, kind: StageKind) -> Self {
        Self {
            path: path.into(),
            kind,
            phase: TracePhase::Enter,
            outcome: None,
            at: Utc::now(),
            elapsed_ms: None,
        }
    }

    pub fn exit(
        path: impl Into<String>,
        kind: StageKind,
        outcome: TraceOutcome,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            phase: TracePhase::Exit,
            outcome: Some(outcome),
            at: Utc::now(),
            elapsed_ms: Some(elapsed_ms),
        }
    }

    pub fn is_success_exit(&self) -> bool {
        self.phase == TracePhase::Exit && self.outcome == Some(TraceOutcome::Success)
    }
}

/// Prefix a parent stage name onto child event paths.
pub(crate) fn prefix_events(events: &mut [TraceEvent], parent: &str) {
    for event in events {
        event.path = format!("{}/{}", parent, event.path);
    }
}
