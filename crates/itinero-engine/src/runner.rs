use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use itinero_core::context::TripContext;
use itinero_core::error::ItineroError;
use itinero_tools::ToolGateway;

use crate::stage::{ExecCtx, Stage};
use crate::trace::TraceEvent;

/// Terminal result of a workflow run.
#[derive(Debug)]
pub enum WorkflowOutcome {
    Completed {
        context: TripContext,
    },
    /// Structured failure: the failed stage path, the error kind, and the
    /// last consistent context snapshot. Never a partial success presented
    /// as complete.
    Failed {
        path: Vec<String>,
        error: ItineroError,
        snapshot: TripContext,
    },
}

/// Final context (or last consistent snapshot) plus the full trace.
#[derive(Debug)]
pub struct WorkflowReport {
    pub outcome: WorkflowOutcome,
    pub trace: Vec<TraceEvent>,
    pub total_elapsed_ms: u64,
}

impl WorkflowReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, WorkflowOutcome::Completed { .. })
    }

    /// The final context on success, the last consistent snapshot on failure.
    pub fn context(&self) -> &TripContext {
        match &self.outcome {
            WorkflowOutcome::Completed { context } => context,
            WorkflowOutcome::Failed { snapshot, .. } => snapshot,
        }
    }
}

/// Top-level driver: validates the stage tree, executes it, and turns any
/// internal failure into a terminal report. Retry lives only inside the
/// tool gateway; the runner never retries whole workflows.
pub struct WorkflowRunner {
    gateway: Arc<ToolGateway>,
    cancel: CancellationToken,
}

impl WorkflowRunner {
    pub fn new(gateway: Arc<ToolGateway>) -> Self {
        Self {
            gateway,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a shared cancellation token (also handed to the gateway so
    /// in-flight tool calls abort through its timeout path).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(&self, root: &Stage, initial: TripContext) -> WorkflowReport {
        let start = Instant::now();

        if let Err(error) = root.validate(&initial.initial_fields()) {
            error!(error = %error, "Workflow failed composition validation");
            return WorkflowReport {
                outcome: WorkflowOutcome::Failed {
                    path: vec![root.name().to_string()],
                    error,
                    snapshot: initial,
                },
                trace: Vec::new(),
                total_elapsed_ms: start.elapsed().as_millis() as u64,
            };
        }

        info!(root = %root.name(), trip = %initial.trip_id, "Starting workflow");
        let exec = ExecCtx {
            gateway: &self.gateway,
            cancel: &self.cancel,
        };

        match root.execute(initial, exec).await {
            Ok(outcome) => {
                let total_elapsed_ms = start.elapsed().as_millis() as u64;
                info!(total_elapsed_ms, "Workflow completed");
                WorkflowReport {
                    outcome: WorkflowOutcome::Completed {
                        context: outcome.context,
                    },
                    trace: outcome.events,
                    total_elapsed_ms,
                }
            }
            Err(failure) => {
                let total_elapsed_ms = start.elapsed().as_millis() as u64;
                error!(
                    path = failure.path.join("/"),
                    error = %failure.error,
                    total_elapsed_ms,
                    "Workflow failed"
                );
                WorkflowReport {
                    outcome: WorkflowOutcome::Failed {
                        path: failure.path,
                        error: failure.error,
                        snapshot: *failure.context,
                    },
                    trace: failure.events,
                    total_elapsed_ms,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use itinero_core::context::Field;

    use crate::sequential::SequentialGroup;
    use crate::testing::{gateway, trip, FnLeaf};

    use super::*;

    #[tokio::test]
    async fn test_run_identity_workflow() {
        let root = Stage::Sequential(SequentialGroup::new("root"));
        let runner = WorkflowRunner::new(Arc::new(gateway()));
        let report = runner.run(&root, trip()).await;
        assert!(report.is_success());
        assert_eq!(report.context(), &trip());
    }

    #[tokio::test]
    async fn test_invalid_composition_rejected_before_execution() {
        let root = Stage::Sequential(SequentialGroup::new("root").then(Stage::leaf(
            FnLeaf::new("consume", vec![Field::Itinerary], vec![], Ok),
        )));
        let runner = WorkflowRunner::new(Arc::new(gateway()));
        let report = runner.run(&root, trip()).await;

        assert!(!report.is_success());
        assert!(report.trace.is_empty());
        match &report.outcome {
            WorkflowOutcome::Failed { error, .. } => {
                assert!(matches!(error, ItineroError::Validation(_)));
            }
            WorkflowOutcome::Completed { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_workflow_is_terminal() {
        let root = Stage::Sequential(SequentialGroup::new("root").then(Stage::leaf(
            FnLeaf::new("anything", vec![], vec![Field::InsuranceRequired], Ok),
        )));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let runner = WorkflowRunner::new(Arc::new(gateway())).with_cancellation(cancel);
        let report = runner.run(&root, trip()).await;

        assert!(!report.is_success());
        match &report.outcome {
            WorkflowOutcome::Failed { error, .. } => {
                assert!(matches!(error, ItineroError::Cancelled));
            }
            WorkflowOutcome::Completed { .. } => panic!("expected cancellation"),
        }
    }
}
