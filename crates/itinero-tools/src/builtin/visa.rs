use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use itinero_core::error::{ItineroError, Result};
use itinero_core::{ComplianceResult, ComplianceStatus, RiskLevel};

use crate::Tool;

#[derive(Debug, Deserialize)]
struct VisaInput {
    nationality: String,
    destination: String,
}

/// Checks visa/entry requirements for a nationality and destination.
pub struct VisaCheckTool;

impl Tool for VisaCheckTool {
    fn name(&self) -> &str {
        "check_visa_requirements"
    }

    fn description(&self) -> &str {
        "Determine visa entry compliance for a nationality and destination"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "nationality": { "type": "string" },
                "destination": { "type": "string" }
            },
            "required": ["nationality", "destination"]
        })
    }

    fn execute(&self, input: serde_json::Value) -> BoxFuture<'_, Result<serde_json::Value>> {
        Box::pin(async move {
            let input: VisaInput =
                serde_json::from_value(input).map_err(|e| ItineroError::Tool {
                    tool: "check_visa_requirements".into(),
                    message: format!("invalid input: {}", e),
                    transient: false,
                })?;

            debug!(
                nationality = %input.nationality,
                destination = %input.destination,
                "Checking visa requirements"
            );

            let destination = input.destination.to_lowercase();
            let schengen = destination.contains("schengen") || destination.contains("switzerland");

            let result = if input.nationality == "US" && schengen {
                ComplianceResult {
                    document_type: "Visa".into(),
                    status: ComplianceStatus::Requirement,
                    risk_level: RiskLevel::Medium,
                    next_action: "Start application within 60 days.".into(),
                }
            } else {
                ComplianceResult {
                    document_type: "Visa".into(),
                    status: ComplianceStatus::NotRequired,
                    risk_level: RiskLevel::Low,
                    next_action: "No action needed.".into(),
                }
            };

            Ok(serde_json::to_value(result)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schengen_requirement() {
        let out = VisaCheckTool
            .execute(serde_json::json!({"nationality": "US", "destination": "Switzerland"}))
            .await
            .unwrap();
        let result: ComplianceResult = serde_json::from_value(out).unwrap();
        assert_eq!(result.status, ComplianceStatus::Requirement);
        assert_eq!(result.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_no_requirement_elsewhere() {
        let out = VisaCheckTool
            .execute(serde_json::json!({"nationality": "US", "destination": "Canada"}))
            .await
            .unwrap();
        let result: ComplianceResult = serde_json::from_value(out).unwrap();
        assert_eq!(result.status, ComplianceStatus::NotRequired);
        assert_eq!(result.risk_level, RiskLevel::Low);
    }
}
