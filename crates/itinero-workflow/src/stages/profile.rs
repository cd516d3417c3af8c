use futures::future::BoxFuture;
use tracing::info;

use itinero_core::context::{Field, PreferenceVector, TripContext};
use itinero_core::error::{ItineroError, Result};
use itinero_engine::LeafStage;
use itinero_tools::ToolGateway;

/// Fetches the preference vector for every member that doesn't have one yet.
///
/// Existing entries are left alone, so re-running a session never clobbers
/// previously fetched profiles.
pub struct TravelerProfileStage;

impl LeafStage for TravelerProfileStage {
    fn name(&self) -> &str {
        "traveler_profile"
    }

    fn reads(&self) -> Vec<Field> {
        vec![Field::GroupMembers]
    }

    fn writes(&self) -> Vec<Field> {
        vec![Field::UserPreferences]
    }

    fn run<'a>(
        &'a self,
        mut ctx: TripContext,
        gateway: &'a ToolGateway,
    ) -> BoxFuture<'a, Result<TripContext>> {
        Box::pin(async move {
            let missing: Vec<String> = ctx
                .group_members
                .iter()
                .filter(|m| !ctx.user_preferences.contains_key(*m))
                .cloned()
                .collect();

            for member in missing {
                info!(member = %member, "Fetching traveler profile");
                let output = gateway
                    .invoke(
                        "fetch_preference_vector",
                        serde_json::json!({ "member_id": member }),
                    )
                    .await?;
                let vector: PreferenceVector = serde_json::from_value(output).map_err(|e| {
                    ItineroError::Validation(format!(
                        "fetch_preference_vector returned malformed output: {}",
                        e
                    ))
                })?;
                ctx.set_member_preferences(member, vector);
            }

            Ok(ctx)
        })
    }
}
