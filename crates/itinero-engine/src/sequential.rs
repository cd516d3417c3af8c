use std::time::Instant;

use tracing::debug;

use itinero_core::context::TripContext;

use crate::stage::{ExecCtx, Stage, StageFailure, StageOutcome, StageResult};
use crate::trace::{prefix_events, StageKind, TraceEvent, TraceOutcome};

/// Ordered composition: output of child *i* is the input of child *i+1*.
///
/// The first fatal child failure aborts the group immediately; the failure
/// carries the context as of the last successful child. An empty group is
/// the identity on its input.
pub struct SequentialGroup {
    name: String,
    children: Vec<Stage>,
}

impl SequentialGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Append a child stage. Declaration order is execution order.
    pub fn then(mut self, stage: Stage) -> Self {
        self.children.push(stage);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Stage] {
        &self.children
    }

    pub(crate) async fn execute(&self, ctx: TripContext, exec: ExecCtx<'_>) -> StageResult {
        let start = Instant::now();
        let mut events = vec![TraceEvent::enter(&self.name, StageKind::Sequential)];
        let mut current = ctx;

        for child in &self.children {
            debug!(group = %self.name, child = %child.name(), "Running sequential child");
            match child.execute(current.clone(), exec).await {
                Ok(mut outcome) => {
                    prefix_events(&mut outcome.events, &self.name);
                    events.extend(outcome.events);
                    current = outcome.context;
                }
                Err(mut failure) => {
                    prefix_events(&mut failure.events, &self.name);
                    events.extend(failure.events);
                    events.push(TraceEvent::exit(
                        &self.name,
                        StageKind::Sequential,
                        TraceOutcome::Failure {
                            error: failure.error.to_string(),
                        },
                        start.elapsed().as_millis() as u64,
                    ));
                    failure.path.insert(0, self.name.clone());
                    return Err(StageFailure {
                        path: failure.path,
                        error: failure.error,
                        context: failure.context,
                        events,
                    });
                }
            }
        }

        events.push(TraceEvent::exit(
            &self.name,
            StageKind::Sequential,
            TraceOutcome::Success,
            start.elapsed().as_millis() as u64,
        ));
        Ok(StageOutcome {
            context: current,
            events,
        })
    }
}
