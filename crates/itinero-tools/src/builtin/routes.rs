use std::collections::BTreeMap;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use itinero_core::error::{ItineroError, Result};
use itinero_core::TransportOption;

use crate::Tool;

#[derive(Debug, Deserialize)]
struct RouteInput {
    origin: String,
    destination: String,
    #[serde(default)]
    date: Option<String>,
}

/// Queries flight and train options for one inter-city segment.
pub struct MultimodalRouteTool;

impl Tool for MultimodalRouteTool {
    fn name(&self) -> &str {
        "query_multimodal_routes"
    }

    fn description(&self) -> &str {
        "Query per-mode price/duration options between two cities"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "origin": { "type": "string" },
                "destination": { "type": "string" },
                "date": { "type": "string" }
            },
            "required": ["origin", "destination"]
        })
    }

    fn execute(&self, input: serde_json::Value) -> BoxFuture<'_, Result<serde_json::Value>> {
        Box::pin(async move {
            let input: RouteInput =
                serde_json::from_value(input).map_err(|e| ItineroError::Tool {
                    tool: "query_multimodal_routes".into(),
                    message: format!("invalid input: {}", e),
                    transient: false,
                })?;

            debug!(
                origin = %input.origin,
                destination = %input.destination,
                date = input.date.as_deref().unwrap_or("unspecified"),
                "Querying multimodal routes"
            );

            let options: BTreeMap<String, TransportOption> = BTreeMap::from([
                (
                    "flight".to_string(),
                    TransportOption {
                        price: 150.0,
                        duration_hours: 2.0,
                        justification: "Fastest option.".into(),
                    },
                ),
                (
                    "train".to_string(),
                    TransportOption {
                        price: 90.0,
                        duration_hours: 4.0,
                        justification: "Cheapest option, scenic route.".into(),
                    },
                ),
            ]);

            Ok(serde_json::to_value(options)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_both_modes() {
        let out = MultimodalRouteTool
            .execute(serde_json::json!({"origin": "London", "destination": "Zurich"}))
            .await
            .unwrap();
        let options: BTreeMap<String, TransportOption> = serde_json::from_value(out).unwrap();
        assert_eq!(options.len(), 2);
        assert!(options["train"].price < options["flight"].price);
        assert!(options["flight"].duration_hours < options["train"].duration_hours);
    }
}
