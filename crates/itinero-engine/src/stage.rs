use std::collections::BTreeSet;
use std::time::Instant;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use itinero_core::context::{Field, TripContext};
use itinero_core::error::{ItineroError, Result};
use itinero_tools::ToolGateway;

use crate::parallel::ParallelGroup;
use crate::sequential::SequentialGroup;
use crate::trace::{StageKind, TraceEvent, TraceOutcome};

/// A unit of work with declared read and write sets.
///
/// A leaf may call tools through the gateway but must not touch context
/// fields outside its declared write-set; the engine diffs its output
/// against its input and fails the stage on any undeclared write.
pub trait LeafStage: Send + Sync {
    /// Stage name, used in trace paths and failure reports.
    fn name(&self) -> &str;

    /// Context fields this stage depends on.
    fn reads(&self) -> Vec<Field>;

    /// Context fields this stage may mutate.
    fn writes(&self) -> Vec<Field>;

    /// Do the work. The context is this stage's private copy.
    fn run<'a>(
        &'a self,
        ctx: TripContext,
        gateway: &'a ToolGateway,
    ) -> BoxFuture<'a, Result<TripContext>>;
}

/// Execution environment threaded through the stage tree.
#[derive(Clone, Copy)]
pub(crate) struct ExecCtx<'a> {
    pub gateway: &'a ToolGateway,
    pub cancel: &'a CancellationToken,
}

/// Successful stage execution: the output context plus this subtree's
/// trace events.
#[derive(Debug)]
pub(crate) struct StageOutcome {
    pub context: TripContext,
    pub events: Vec<TraceEvent>,
}

/// Failed stage execution. Carries the path of the failed stage, the last
/// consistent context snapshot, and the trace accumulated so far.
#[derive(Debug)]
pub struct StageFailure {
    pub path: Vec<String>,
    pub error: ItineroError,
    pub context: Box<TripContext>,
    pub events: Vec<TraceEvent>,
}

pub(crate) type StageResult = std::result::Result<StageOutcome, StageFailure>;

/// A composable unit of workflow execution.
pub enum Stage {
    Leaf(Box<dyn LeafStage>),
    Sequential(SequentialGroup),
    Parallel(ParallelGroup),
}

impl Stage {
    pub fn leaf(stage: impl LeafStage + 'static) -> Self {
        Self::Leaf(Box::new(stage))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Leaf(leaf) => leaf.name(),
            Self::Sequential(group) => group.name(),
            Self::Parallel(group) => group.name(),
        }
    }

    pub fn kind(&self) -> StageKind {
        match self {
            Self::Leaf(_) => StageKind::Leaf,
            Self::Sequential(_) => StageKind::Sequential,
            Self::Parallel(_) => StageKind::Parallel,
        }
    }

    /// All fields this subtree may write.
    pub fn write_set(&self) -> BTreeSet<Field> {
        match self {
            Self::Leaf(leaf) => leaf.writes().into_iter().collect(),
            Self::Sequential(group) => group
                .children()
                .iter()
                .flat_map(|c| c.write_set())
                .collect(),
            Self::Parallel(group) => group
                .branches()
                .iter()
                .flat_map(|b| b.stage.write_set())
                .collect(),
        }
    }

    /// Static composition check, run before execution.
    ///
    /// Verifies that every leaf's reads are satisfiable from `available`
    /// (the initial populated fields plus upstream writes in declared
    /// order) and that sibling parallel branches declare disjoint
    /// write-sets. Returns `available` extended with this subtree's writes.
    pub fn validate(&self, available: &BTreeSet<Field>) -> Result<BTreeSet<Field>> {
        match self {
            Self::Leaf(leaf) => {
                for field in leaf.reads() {
                    if !available.contains(&field) {
                        return Err(ItineroError::Validation(format!(
                            "stage '{}' reads '{}' which no earlier stage provides",
                            leaf.name(),
                            field
                        )));
                    }
                }
                let mut next = available.clone();
                next.extend(leaf.writes());
                Ok(next)
            }
            Self::Sequential(group) => {
                let mut current = available.clone();
                for child in group.children() {
                    current = child.validate(&current)?;
                }
                Ok(current)
            }
            Self::Parallel(group) => {
                let branches = group.branches();
                for (i, a) in branches.iter().enumerate() {
                    let a_writes = a.stage.write_set();
                    for b in &branches[i + 1..] {
                        if let Some(shared) =
                            b.stage.write_set().iter().find(|f| a_writes.contains(f))
                        {
                            return Err(ItineroError::Validation(format!(
                                "parallel group '{}': branches '{}' and '{}' both declare write to '{}'",
                                group.name(),
                                a.stage.name(),
                                b.stage.name(),
                                shared
                            )));
                        }
                    }
                }
                // Branches fork from the same pre-group context, so each
                // validates against the same available set.
                let mut merged = available.clone();
                for branch in branches {
                    merged.extend(branch.stage.validate(available)?);
                }
                Ok(merged)
            }
        }
    }

    pub(crate) fn execute<'a>(
        &'a self,
        ctx: TripContext,
        exec: ExecCtx<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            match self {
                Self::Leaf(leaf) => run_leaf(leaf.as_ref(), ctx, exec).await,
                Self::Sequential(group) => group.execute(ctx, exec).await,
                Self::Parallel(group) => group.execute(ctx, exec).await,
            }
        })
    }
}

async fn run_leaf(leaf: &dyn LeafStage, ctx: TripContext, exec: ExecCtx<'_>) -> StageResult {
    let name = leaf.name().to_string();
    let mut events = vec![TraceEvent::enter(&name, StageKind::Leaf)];
    let start = Instant::now();

    let fail = |error: ItineroError, snapshot: TripContext, mut events: Vec<TraceEvent>| {
        error!(stage = %name, error = %error, "Leaf stage failed");
        events.push(TraceEvent::exit(
            &name,
            StageKind::Leaf,
            TraceOutcome::Failure {
                error: error.to_string(),
            },
            start.elapsed().as_millis() as u64,
        ));
        Err(StageFailure {
            path: vec![name.clone()],
            error,
            context: Box::new(snapshot),
            events,
        })
    };

    if exec.cancel.is_cancelled() {
        return fail(ItineroError::Cancelled, ctx, events);
    }

    for field in leaf.reads() {
        if !ctx.is_populated(&field) {
            return fail(
                ItineroError::Validation(format!(
                    "stage '{}' requires '{}' but it is not populated",
                    name, field
                )),
                ctx,
                events,
            );
        }
    }

    debug!(stage = %name, "Running leaf stage");
    match leaf.run(ctx.clone(), exec.gateway).await {
        Ok(output) => {
            let declared: BTreeSet<Field> = leaf.writes().into_iter().collect();
            let touched = output.diff(&ctx);
            if let Some(stray) = touched.iter().find(|f| !declared.contains(f)) {
                return fail(
                    ItineroError::Validation(format!(
                        "stage '{}' wrote '{}' outside its declared write-set",
                        name, stray
                    )),
                    ctx,
                    events,
                );
            }
            events.push(TraceEvent::exit(
                &name,
                StageKind::Leaf,
                TraceOutcome::Success,
                start.elapsed().as_millis() as u64,
            ));
            Ok(StageOutcome {
                context: output,
                events,
            })
        }
        Err(error) => fail(error, ctx, events),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{gateway, run_stage, FnLeaf};

    #[tokio::test]
    async fn test_leaf_undeclared_write_rejected() {
        let leaf = FnLeaf::new("sneaky", vec![], vec![Field::GroupPreferences], |mut ctx| {
            ctx.insurance_required = true; // not declared
            Ok(ctx)
        });
        let gw = gateway();
        let failure = run_stage(&Stage::leaf(leaf), &gw).await.unwrap_err();
        assert!(matches!(failure.error, ItineroError::Validation(_)));
        assert_eq!(failure.path, vec!["sneaky"]);
        // Snapshot is the pre-stage context
        assert!(!failure.context.insurance_required);
    }

    #[tokio::test]
    async fn test_leaf_missing_read_rejected() {
        let leaf = FnLeaf::new("needy", vec![Field::Itinerary], vec![], Ok);
        let gw = gateway();
        let failure = run_stage(&Stage::leaf(leaf), &gw).await.unwrap_err();
        assert!(matches!(failure.error, ItineroError::Validation(_)));
    }

    #[tokio::test]
    async fn test_leaf_declared_write_allowed() {
        let leaf = FnLeaf::new("ok", vec![], vec![Field::InsuranceRequired], |mut ctx| {
            ctx.insurance_required = true;
            Ok(ctx)
        });
        let gw = gateway();
        let outcome = run_stage(&Stage::leaf(leaf), &gw).await.unwrap();
        assert!(outcome.context.insurance_required);
        assert_eq!(outcome.events.len(), 2);
        assert!(outcome.events[1].is_success_exit());
    }

    #[test]
    fn test_validate_read_dependency_ordering() {
        use crate::sequential::SequentialGroup;

        let produces = FnLeaf::new("produce", vec![], vec![Field::GroupPreferences], Ok);
        let consumes = FnLeaf::new("consume", vec![Field::GroupPreferences], vec![], Ok);

        // Consumer before producer: rejected
        let bad = Stage::Sequential(
            SequentialGroup::new("root")
                .then(Stage::leaf(FnLeaf::new(
                    "consume",
                    vec![Field::GroupPreferences],
                    vec![],
                    Ok,
                )))
                .then(Stage::leaf(FnLeaf::new(
                    "produce",
                    vec![],
                    vec![Field::GroupPreferences],
                    Ok,
                ))),
        );
        assert!(bad.validate(&BTreeSet::new()).is_err());

        // Producer before consumer: accepted
        let good = Stage::Sequential(
            SequentialGroup::new("root")
                .then(Stage::leaf(produces))
                .then(Stage::leaf(consumes)),
        );
        assert!(good.validate(&BTreeSet::new()).is_ok());
    }
}
