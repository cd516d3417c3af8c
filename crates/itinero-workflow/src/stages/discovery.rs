use futures::future::BoxFuture;
use tracing::info;

use itinero_core::context::{Field, ItinerarySegment, PointOfInterest, TripContext};
use itinero_core::error::{ItineroError, Result};
use itinero_engine::LeafStage;
use itinero_tools::ToolGateway;

/// Discovers candidate points of interest for the destination.
///
/// The search query is built from the group's top preference categories
/// (e.g. "nature and budget spots near Switzerland").
pub struct PlaceDiscoveryStage;

impl LeafStage for PlaceDiscoveryStage {
    fn name(&self) -> &str {
        "place_discovery"
    }

    fn reads(&self) -> Vec<Field> {
        vec![Field::Destination, Field::GroupPreferences]
    }

    fn writes(&self) -> Vec<Field> {
        vec![Field::DiscoveredPois]
    }

    fn run<'a>(
        &'a self,
        mut ctx: TripContext,
        gateway: &'a ToolGateway,
    ) -> BoxFuture<'a, Result<TripContext>> {
        Box::pin(async move {
            let preferences = ctx.group_preferences.clone().ok_or_else(|| {
                ItineroError::Validation("place discovery requires group preferences".into())
            })?;

            // Top two categories by score drive the query text.
            let mut ranked: Vec<(&String, &f64)> = preferences.iter().collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
            let top: Vec<&str> = ranked.iter().take(2).map(|(k, _)| k.as_str()).collect();
            let query = format!("{} spots near {}", top.join(" and "), ctx.destination);

            info!(query = %query, "Discovering points of interest");
            let output = gateway
                .invoke(
                    "query_verified_pois",
                    serde_json::json!({ "query": query, "preferences": preferences }),
                )
                .await?;
            let records: Vec<ItinerarySegment> =
                serde_json::from_value(output).map_err(|e| {
                    ItineroError::Validation(format!(
                        "query_verified_pois returned malformed output: {}",
                        e
                    ))
                })?;

            ctx.discovered_pois = records
                .into_iter()
                .map(|record| PointOfInterest {
                    name: record.poi_name.clone(),
                    detail: serde_json::to_value(record).unwrap_or_default(),
                })
                .collect();
            info!(count = ctx.discovered_pois.len(), "Stored discovered POIs");
            Ok(ctx)
        })
    }
}
