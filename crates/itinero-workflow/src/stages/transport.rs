use std::collections::BTreeMap;

use futures::future::BoxFuture;
use tracing::info;

use itinero_core::context::{Field, TransportComparison, TransportOption, TripContext};
use itinero_core::error::{ItineroError, Result};
use itinero_engine::LeafStage;
use itinero_tools::ToolGateway;

/// Queries inter-city transport modes and picks the best against the group
/// preference vector: budget-conscious groups get the cheapest mode,
/// others the fastest. Owns `transport_options["intercity"]`.
pub struct SegmentTransportStage {
    origin: String,
}

impl SegmentTransportStage {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }
}

impl Default for SegmentTransportStage {
    fn default() -> Self {
        Self::new("home")
    }
}

impl LeafStage for SegmentTransportStage {
    fn name(&self) -> &str {
        "segment_transport"
    }

    fn reads(&self) -> Vec<Field> {
        vec![Field::Destination, Field::GroupPreferences]
    }

    fn writes(&self) -> Vec<Field> {
        vec![Field::Transport("intercity".into()), Field::CostEstimate]
    }

    fn run<'a>(
        &'a self,
        mut ctx: TripContext,
        gateway: &'a ToolGateway,
    ) -> BoxFuture<'a, Result<TripContext>> {
        Box::pin(async move {
            let date = ctx
                .travel_dates
                .map(|(start, _)| start.to_string());
            let output = gateway
                .invoke(
                    "query_multimodal_routes",
                    serde_json::json!({
                        "origin": self.origin,
                        "destination": ctx.destination,
                        "date": date,
                    }),
                )
                .await?;
            let options: BTreeMap<String, TransportOption> = serde_json::from_value(output)
                .map_err(|e| {
                    ItineroError::Validation(format!(
                        "query_multimodal_routes returned malformed output: {}",
                        e
                    ))
                })?;
            if options.is_empty() {
                return Err(ItineroError::Validation(
                    "route query returned no transport modes".into(),
                ));
            }

            let budget_score = ctx
                .group_preferences
                .as_ref()
                .and_then(|p| p.get("budget").copied())
                .unwrap_or(0.5);
            let budget_conscious = budget_score >= 0.5;

            let best = options
                .iter()
                .min_by(|(_, a), (_, b)| {
                    let (ka, kb) = if budget_conscious {
                        (a.price, b.price)
                    } else {
                        (a.duration_hours, b.duration_hours)
                    };
                    ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(mode, _)| mode.clone())
                .unwrap_or_default();

            let justification = if budget_conscious {
                format!("'{}' is the cheapest mode for a high budget score.", best)
            } else {
                format!("'{}' is the fastest mode; the group values time over cost.", best)
            };
            info!(best = %best, budget_score, "Selected intercity transport");

            let cost = options.get(&best).map(|o| o.price).unwrap_or(0.0);
            ctx.transport_options.insert(
                "intercity".into(),
                TransportComparison {
                    options,
                    best_pick: Some(best),
                    justification,
                },
            );
            ctx.add_cost(cost)?;
            Ok(ctx)
        })
    }
}

/// Plans first/last-mile transport per member: rental car for members with
/// a comfortable budget score, ride-share for tight budgets. Owns
/// `transport_options["local"]`.
pub struct LocalLogisticsStage;

impl LeafStage for LocalLogisticsStage {
    fn name(&self) -> &str {
        "local_logistics"
    }

    fn reads(&self) -> Vec<Field> {
        vec![Field::GroupMembers, Field::UserPreferences]
    }

    fn writes(&self) -> Vec<Field> {
        vec![Field::Transport("local".into())]
    }

    fn run<'a>(
        &'a self,
        mut ctx: TripContext,
        _gateway: &'a ToolGateway,
    ) -> BoxFuture<'a, Result<TripContext>> {
        Box::pin(async move {
            let mut options = BTreeMap::new();
            for member in &ctx.group_members {
                let budget = ctx
                    .user_preferences
                    .get(member)
                    .and_then(|p| p.get("budget").copied())
                    .unwrap_or(0.5);

                let option = if budget >= 0.5 {
                    TransportOption {
                        price: 35.0,
                        duration_hours: 0.5,
                        justification: format!(
                            "Ride-share suggested for {}: tight budget (score {:.1}).",
                            member, budget
                        ),
                    }
                } else {
                    TransportOption {
                        price: 80.0,
                        duration_hours: 0.5,
                        justification: format!(
                            "Rental recommended for {}: budget allows comfort (score {:.1}).",
                            member, budget
                        ),
                    }
                };
                options.insert(member.clone(), option);
            }

            info!(members = options.len(), "Planned local logistics");
            ctx.transport_options.insert(
                "local".into(),
                TransportComparison {
                    options,
                    best_pick: None,
                    justification: "Per-member first/last-mile plan.".into(),
                },
            );
            Ok(ctx)
        })
    }
}
