use itinero_core::config::EngineConfig;
use itinero_engine::{ParallelGroup, SequentialGroup, Stage};

use crate::stages::{
    InsuranceRiskStage, ItineraryStage, LocalLogisticsStage, PersonalizationStage,
    PlaceDiscoveryStage, SegmentTransportStage, TravelerProfileStage, VisaCheckStage,
};

/// The full trip-planning pipeline.
///
/// Profile and compliance run strictly before planning: the insurance
/// decision reads the visa check's output, and nothing downstream runs if
/// compliance fails. The two transport stages own disjoint
/// `transport_options` keys and run concurrently.
pub fn trip_planning_workflow(config: &EngineConfig) -> Stage {
    Stage::Sequential(
        SequentialGroup::new("trip_planner")
            .then(Stage::leaf(TravelerProfileStage))
            .then(Stage::leaf(PersonalizationStage))
            .then(Stage::Sequential(
                SequentialGroup::new("compliance")
                    .then(Stage::leaf(VisaCheckStage::new(&config.nationality)))
                    .then(Stage::leaf(InsuranceRiskStage::new(
                        config.insurance_policy.clone(),
                    ))),
            ))
            .then(Stage::leaf(PlaceDiscoveryStage))
            .then(Stage::leaf(ItineraryStage::new()))
            .then(Stage::Parallel(
                ParallelGroup::new("transport")
                    .branch(Stage::leaf(SegmentTransportStage::default()))
                    .branch(Stage::leaf(LocalLogisticsStage)),
            )),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use itinero_core::context::TripContext;

    use super::*;

    #[test]
    fn test_workflow_composition_is_valid() {
        let workflow = trip_planning_workflow(&EngineConfig::default());
        let initial = TripContext::new(
            "TRIP-001",
            "Switzerland",
            vec!["alice".into(), "bob".into()],
            None,
        )
        .unwrap();
        workflow.validate(&initial.initial_fields()).unwrap();
    }

    #[test]
    fn test_transport_write_sets_disjoint() {
        let workflow = trip_planning_workflow(&EngineConfig::default());
        let writes: BTreeSet<_> = workflow.write_set();
        assert!(writes.contains(&itinero_core::context::Field::Transport("intercity".into())));
        assert!(writes.contains(&itinero_core::context::Field::Transport("local".into())));
    }
}
