use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use itinero_core::error::{ItineroError, Result};
use itinero_core::PreferenceVector;

use crate::Tool;

#[derive(Debug, Deserialize)]
struct PreferenceInput {
    member_id: String,
}

/// Looks up a traveler's preference vector from the profile store.
pub struct PreferenceVectorTool;

impl Tool for PreferenceVectorTool {
    fn name(&self) -> &str {
        "fetch_preference_vector"
    }

    fn description(&self) -> &str {
        "Retrieve a traveler's category->score preference vector by member id"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "member_id": { "type": "string" }
            },
            "required": ["member_id"]
        })
    }

    fn execute(&self, input: serde_json::Value) -> BoxFuture<'_, Result<serde_json::Value>> {
        Box::pin(async move {
            let input: PreferenceInput = serde_json::from_value(input).map_err(|e| {
                ItineroError::Tool {
                    tool: "fetch_preference_vector".into(),
                    message: format!("invalid input: {}", e),
                    transient: false,
                }
            })?;

            debug!(member = %input.member_id, "Fetching preference vector");
            let vector = profile_for(&input.member_id);
            Ok(serde_json::to_value(vector)?)
        })
    }
}

fn profile_for(member_id: &str) -> PreferenceVector {
    let scores: &[(&str, f64)] = match member_id {
        "alice" => &[("budget", 0.2), ("nature", 0.9)],
        "bob" => &[("budget", 0.8), ("nature", 0.3)],
        _ => &[
            ("budget", 0.5),
            ("nature", 0.6),
            ("history", 0.4),
            ("luxury", 0.1),
        ],
    };
    scores
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_known_member() {
        let out = PreferenceVectorTool
            .execute(serde_json::json!({"member_id": "alice"}))
            .await
            .unwrap();
        let vector: PreferenceVector = serde_json::from_value(out).unwrap();
        assert_eq!(vector["budget"], 0.2);
        assert_eq!(vector["nature"], 0.9);
    }

    #[tokio::test]
    async fn test_invalid_input_is_permanent() {
        let err = PreferenceVectorTool
            .execute(serde_json::json!({"user": 42}))
            .await
            .unwrap_err();
        assert!(matches!(err, ItineroError::Tool { transient: false, .. }));
    }
}
