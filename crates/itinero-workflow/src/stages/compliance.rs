use futures::future::BoxFuture;
use tracing::info;

use itinero_core::config::InsurancePolicy;
use itinero_core::context::{ComplianceResult, Field, TripContext};
use itinero_core::error::{ItineroError, Result};
use itinero_engine::LeafStage;
use itinero_tools::ToolGateway;

/// Checks visa entry requirements and folds the result into the context.
///
/// The raw [`ComplianceResult`] exists only between this stage and the
/// insurance stage that follows it in the compliance group; once folded
/// into the context it is not stored independently.
pub struct VisaCheckStage {
    nationality: String,
}

impl VisaCheckStage {
    pub fn new(nationality: impl Into<String>) -> Self {
        Self {
            nationality: nationality.into(),
        }
    }
}

impl LeafStage for VisaCheckStage {
    fn name(&self) -> &str {
        "visa_check"
    }

    fn reads(&self) -> Vec<Field> {
        vec![Field::Destination]
    }

    fn writes(&self) -> Vec<Field> {
        vec![
            Field::ComplianceStatus,
            Field::RiskLevel,
            Field::VisaDeadline,
        ]
    }

    fn run<'a>(
        &'a self,
        mut ctx: TripContext,
        gateway: &'a ToolGateway,
    ) -> BoxFuture<'a, Result<TripContext>> {
        Box::pin(async move {
            let output = gateway
                .invoke(
                    "check_visa_requirements",
                    serde_json::json!({
                        "nationality": self.nationality,
                        "destination": ctx.destination,
                    }),
                )
                .await?;
            let result: ComplianceResult = serde_json::from_value(output).map_err(|e| {
                ItineroError::Validation(format!(
                    "check_visa_requirements returned malformed output: {}",
                    e
                ))
            })?;

            info!(
                status = ?result.status,
                risk = ?result.risk_level,
                "Visa compliance determined"
            );
            ctx.set_compliance(result.status)?;
            ctx.risk_level = Some(result.risk_level);
            ctx.visa_deadline = Some(result.next_action);
            Ok(ctx)
        })
    }
}

/// Decides whether insurance is mandatory from the compliance risk level,
/// via the configured policy table.
pub struct InsuranceRiskStage {
    policy: InsurancePolicy,
}

impl InsuranceRiskStage {
    pub fn new(policy: InsurancePolicy) -> Self {
        Self { policy }
    }
}

impl LeafStage for InsuranceRiskStage {
    fn name(&self) -> &str {
        "insurance_risk"
    }

    fn reads(&self) -> Vec<Field> {
        vec![Field::ComplianceStatus, Field::RiskLevel]
    }

    fn writes(&self) -> Vec<Field> {
        vec![Field::InsuranceRequired]
    }

    fn run<'a>(
        &'a self,
        mut ctx: TripContext,
        _gateway: &'a ToolGateway,
    ) -> BoxFuture<'a, Result<TripContext>> {
        Box::pin(async move {
            let risk = ctx.risk_level.ok_or_else(|| {
                ItineroError::Validation("insurance decision requires a risk level".into())
            })?;
            ctx.insurance_required = self.policy.requires(risk);
            info!(
                risk = ?risk,
                required = ctx.insurance_required,
                "Insurance decision made"
            );
            Ok(ctx)
        })
    }
}
