use itinero_core::context::{ComplianceStatus, TripContext};
use itinero_engine::{WorkflowOutcome, WorkflowReport};

/// Render the human-readable outcome of a workflow run.
///
/// A failed run gets a failure report naming the failed stage path and
/// error kind; it is never presented as a completed plan.
pub fn render(report: &WorkflowReport) -> String {
    match &report.outcome {
        WorkflowOutcome::Completed { context } => render_plan(context),
        WorkflowOutcome::Failed { path, error, .. } => format!(
            "Trip planning failed at stage '{}': {}\n\
             The last consistent state has been kept for this session.",
            path.join("/"),
            error
        ),
    }
}

fn render_plan(ctx: &TripContext) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Trip plan for {} ({} travelers)\n",
        ctx.destination,
        ctx.group_members.len()
    ));

    out.push_str(&format!(
        "Compliance: {}\n",
        match ctx.compliance_status {
            ComplianceStatus::Pending => "pending".to_string(),
            ComplianceStatus::Requirement => format!(
                "visa required{}, insurance {}",
                ctx.visa_deadline
                    .as_deref()
                    .map(|d| format!(" ({})", d))
                    .unwrap_or_default(),
                if ctx.insurance_required {
                    "mandatory"
                } else {
                    "optional"
                }
            ),
            ComplianceStatus::NotRequired => "no visa needed".to_string(),
        }
    ));

    if !ctx.itinerary.is_empty() {
        let days = ctx.itinerary.last().map(|s| s.day).unwrap_or(0);
        out.push_str(&format!("Itinerary ({} days):\n", days));
        for segment in &ctx.itinerary {
            out.push_str(&format!(
                "  day {}: {} ({})\n",
                segment.day, segment.poi_name, segment.justification
            ));
        }
    }

    for (scope, comparison) in &ctx.transport_options {
        match &comparison.best_pick {
            Some(best) => out.push_str(&format!(
                "Transport ({}): {}. {}\n",
                scope, best, comparison.justification
            )),
            None => out.push_str(&format!(
                "Transport ({}): {}\n",
                scope, comparison.justification
            )),
        }
    }

    out.push_str(&format!("Estimated cost: {:.2}\n", ctx.cost_estimate));
    out
}
