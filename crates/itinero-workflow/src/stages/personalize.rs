use futures::future::BoxFuture;
use tracing::debug;

use itinero_core::context::{Field, TripContext};
use itinero_core::error::{ItineroError, Result};
use itinero_engine::LeafStage;
use itinero_tools::ToolGateway;

/// Derives the group preference vector as the element-wise average of all
/// member vectors. Every member must have a profile entry by the time this
/// stage runs; a missing entry is a composition defect.
pub struct PersonalizationStage;

impl LeafStage for PersonalizationStage {
    fn name(&self) -> &str {
        "personalization"
    }

    fn reads(&self) -> Vec<Field> {
        vec![Field::GroupMembers, Field::UserPreferences]
    }

    fn writes(&self) -> Vec<Field> {
        vec![Field::GroupPreferences]
    }

    fn run<'a>(
        &'a self,
        mut ctx: TripContext,
        _gateway: &'a ToolGateway,
    ) -> BoxFuture<'a, Result<TripContext>> {
        Box::pin(async move {
            if let Some(member) = ctx
                .group_members
                .iter()
                .find(|m| !ctx.user_preferences.contains_key(*m))
            {
                return Err(ItineroError::Validation(format!(
                    "member '{}' has no preference vector before personalization",
                    member
                )));
            }

            let average = ctx.average_preferences().ok_or_else(|| {
                ItineroError::Validation("no preference vectors to aggregate".into())
            })?;
            debug!(categories = average.len(), "Computed group preference vector");
            ctx.group_preferences = Some(average);
            Ok(ctx)
        })
    }
}
