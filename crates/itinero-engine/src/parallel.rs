use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, warn};

use itinero_core::context::TripContext;
use itinero_core::error::ItineroError;

use crate::merge::merge_forks;
use crate::stage::{ExecCtx, Stage, StageFailure, StageOutcome, StageResult};
use crate::trace::{prefix_events, StageKind, TraceEvent, TraceOutcome};

/// A branch of a parallel group.
///
/// Required branches make the group fatal on failure; optional branches are
/// logged and tolerated.
pub struct Branch {
    pub stage: Stage,
    pub required: bool,
}

/// Concurrent composition over an unordered set of branches.
///
/// Every branch receives an independent fork of the group's input and all
/// branches run to completion before the group returns (a join barrier; no
/// branch is abandoned once started). Branch writes become visible only
/// through the merge at the barrier.
pub struct ParallelGroup {
    name: String,
    branches: Vec<Branch>,
}

impl ParallelGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branches: Vec::new(),
        }
    }

    /// Add a required branch.
    pub fn branch(mut self, stage: Stage) -> Self {
        self.branches.push(Branch {
            stage,
            required: true,
        });
        self
    }

    /// Add an optional branch: its failure does not fail the group.
    pub fn optional_branch(mut self, stage: Stage) -> Self {
        self.branches.push(Branch {
            stage,
            required: false,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub(crate) async fn execute(&self, ctx: TripContext, exec: ExecCtx<'_>) -> StageResult {
        let start = Instant::now();
        let mut events = vec![TraceEvent::enter(&self.name, StageKind::Parallel)];
        let base = ctx;

        debug!(group = %self.name, branches = self.branches.len(), "Forking parallel branches");
        let futures: Vec<_> = self
            .branches
            .iter()
            .map(|b| b.stage.execute(base.fork(), exec))
            .collect();
        let results = join_all(futures).await;

        let mut forks: Vec<(String, TripContext)> = Vec::new();
        let mut failed: Vec<(String, bool, ItineroError)> = Vec::new();
        for (branch, result) in self.branches.iter().zip(results) {
            match result {
                Ok(mut outcome) => {
                    prefix_events(&mut outcome.events, &self.name);
                    events.extend(outcome.events);
                    forks.push((branch.stage.name().to_string(), outcome.context));
                }
                Err(mut failure) => {
                    prefix_events(&mut failure.events, &self.name);
                    events.extend(failure.events);
                    failed.push((branch.stage.name().to_string(), branch.required, failure.error));
                }
            }
        }

        let fail = |error: ItineroError,
                    snapshot: TripContext,
                    mut events: Vec<TraceEvent>,
                    elapsed: u64| {
            events.push(TraceEvent::exit(
                &self.name,
                StageKind::Parallel,
                TraceOutcome::Failure {
                    error: error.to_string(),
                },
                elapsed,
            ));
            Err(StageFailure {
                path: vec![self.name.clone()],
                error,
                context: Box::new(snapshot),
                events,
            })
        };

        let merged = match merge_forks(&base, &forks) {
            Ok(merged) => merged,
            Err(error) => {
                // Ambiguous merges are defects; the pre-fork context is the
                // last consistent snapshot.
                return fail(error, base, events, start.elapsed().as_millis() as u64);
            }
        };

        let required_failures: Vec<String> = failed
            .iter()
            .filter(|(_, required, _)| *required)
            .map(|(name, _, _)| name.clone())
            .collect();
        for (name, required, error) in &failed {
            warn!(
                group = %self.name,
                branch = %name,
                required,
                error = %error,
                "Parallel branch failed"
            );
        }

        if !required_failures.is_empty() {
            // The merged context of the surviving branches travels with the
            // failure as the diagnostic snapshot.
            return fail(
                ItineroError::Branches {
                    group: self.name.clone(),
                    failed: required_failures,
                },
                merged,
                events,
                start.elapsed().as_millis() as u64,
            );
        }

        events.push(TraceEvent::exit(
            &self.name,
            StageKind::Parallel,
            TraceOutcome::Success,
            start.elapsed().as_millis() as u64,
        ));
        Ok(StageOutcome {
            context: merged,
            events,
        })
    }
}
