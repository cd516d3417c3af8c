use futures::future::BoxFuture;
use tracing::info;

use itinero_core::context::{Field, ItinerarySegment, TripContext};
use itinero_core::error::{ItineroError, Result};
use itinero_engine::LeafStage;
use itinero_tools::ToolGateway;

/// Builds the base itinerary from high-confidence discovered POIs.
///
/// Segments are renumbered contiguously from day 1, two per day, and each
/// costed segment bumps the running estimate.
pub struct ItineraryStage {
    min_confidence: f64,
    cost_per_segment: f64,
}

impl Default for ItineraryStage {
    fn default() -> Self {
        Self {
            min_confidence: 0.8,
            cost_per_segment: 45.0,
        }
    }
}

impl ItineraryStage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeafStage for ItineraryStage {
    fn name(&self) -> &str {
        "itinerary_planning"
    }

    fn reads(&self) -> Vec<Field> {
        vec![Field::GroupPreferences, Field::DiscoveredPois]
    }

    fn writes(&self) -> Vec<Field> {
        vec![Field::Itinerary, Field::CostEstimate]
    }

    fn run<'a>(
        &'a self,
        mut ctx: TripContext,
        _gateway: &'a ToolGateway,
    ) -> BoxFuture<'a, Result<TripContext>> {
        Box::pin(async move {
            let mut candidates: Vec<ItinerarySegment> = Vec::new();
            for poi in &ctx.discovered_pois {
                let record: ItinerarySegment = serde_json::from_value(poi.detail.clone())
                    .map_err(|e| {
                        ItineroError::Validation(format!(
                            "discovered POI '{}' is not itinerary-shaped: {}",
                            poi.name, e
                        ))
                    })?;
                if record.confidence >= self.min_confidence {
                    candidates.push(record);
                }
            }

            if candidates.is_empty() {
                return Err(ItineroError::Validation(
                    "no POIs meet the confidence threshold for an itinerary".into(),
                ));
            }

            let segments: Vec<ItinerarySegment> = candidates
                .into_iter()
                .enumerate()
                .map(|(i, record)| {
                    ItinerarySegment::new(
                        (i as u32 / 2) + 1,
                        record.poi_name,
                        record.justification,
                        record.confidence,
                    )
                })
                .collect();

            let total_cost = self.cost_per_segment * segments.len() as f64;
            info!(
                segments = segments.len(),
                days = segments.last().map(|s| s.day).unwrap_or(0),
                "Generated base itinerary"
            );
            ctx.set_itinerary(segments)?;
            ctx.add_cost(total_cost)?;
            Ok(ctx)
        })
    }
}

#[cfg(test)]
mod tests {
    use itinero_core::config::RetryConfig;
    use itinero_core::context::PointOfInterest;
    use itinero_tools::{ToolGateway, ToolRegistry};

    use super::*;

    fn gateway() -> ToolGateway {
        ToolGateway::new(ToolRegistry::new(), RetryConfig::default(), 1000)
    }

    fn poi(name: &str, confidence: f64) -> PointOfInterest {
        let segment = ItinerarySegment::new(1, name, "matches nature", confidence);
        PointOfInterest {
            name: name.into(),
            detail: serde_json::to_value(segment).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_days_contiguous_and_cost_added() {
        let mut ctx = TripContext::new("t", "x", vec!["a".into()], None).unwrap();
        ctx.group_preferences = Some(Default::default());
        ctx.discovered_pois = vec![
            poi("Trailhead", 0.95),
            poi("Market", 0.88),
            poi("Viewpoint", 0.90),
            poi("Dive Bar", 0.42), // below threshold
        ];

        let gw = gateway();
        let out = ItineraryStage::new().run(ctx, &gw).await.unwrap();
        assert_eq!(out.itinerary.len(), 3);
        assert_eq!(
            out.itinerary.iter().map(|s| s.day).collect::<Vec<_>>(),
            vec![1, 1, 2]
        );
        assert!((out.cost_estimate - 135.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_candidates_is_failure() {
        let mut ctx = TripContext::new("t", "x", vec!["a".into()], None).unwrap();
        ctx.group_preferences = Some(Default::default());
        ctx.discovered_pois = vec![poi("Dive Bar", 0.1)];

        let gw = gateway();
        let err = ItineraryStage::new().run(ctx, &gw).await.unwrap_err();
        assert!(matches!(err, ItineroError::Validation(_)));
    }
}
