use std::collections::BTreeMap;

use itinero_core::context::{Field, TripContext};
use itinero_core::error::{ItineroError, Result};

/// Reconcile concurrently forked contexts against their common base.
///
/// A field counts as touched by a branch if its value differs from the
/// pre-fork base. Untouched fields keep the base value; a field touched by
/// exactly one branch takes that branch's value; a field touched by two
/// branches is a composition defect and fails before anything is applied.
pub fn merge_forks(base: &TripContext, forks: &[(String, TripContext)]) -> Result<TripContext> {
    let diffs: Vec<(&str, Vec<Field>)> = forks
        .iter()
        .map(|(name, fork)| (name.as_str(), fork.diff(base).into_iter().collect()))
        .collect();

    // Conflict detection first, so a violation never half-applies.
    let mut owner: BTreeMap<&Field, &str> = BTreeMap::new();
    for (name, touched) in &diffs {
        for field in touched {
            if let Some(previous) = owner.insert(field, *name) {
                return Err(ItineroError::Validation(format!(
                    "ambiguous merge: field '{}' written by branches '{}' and '{}'",
                    field, previous, name
                )));
            }
        }
    }

    let mut merged = base.clone();
    for ((_, fork), (_, touched)) in forks.iter().zip(&diffs) {
        for field in touched {
            merged.take_field(field, fork);
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use itinero_core::context::TransportComparison;

    use crate::testing::trip;

    use super::*;

    #[test]
    fn test_disjoint_merge() {
        let base = trip();

        let mut a = base.fork();
        a.transport_options
            .insert("intercity".into(), TransportComparison::default());
        let mut b = base.fork();
        b.insurance_required = true;

        let merged = merge_forks(
            &base,
            &[("segment".to_string(), a), ("insurance".to_string(), b)],
        )
        .unwrap();

        assert!(merged.transport_options.contains_key("intercity"));
        assert!(merged.insurance_required);
        // Untouched fields keep the pre-fork value
        assert_eq!(merged.destination, base.destination);
    }

    #[test]
    fn test_overlap_fails_before_applying() {
        let base = trip();

        let mut a = base.fork();
        a.insurance_required = true;
        let mut b = base.fork();
        b.insurance_required = true;

        let err = merge_forks(&base, &[("a".to_string(), a), ("b".to_string(), b)]).unwrap_err();
        assert!(matches!(err, ItineroError::Validation(_)));
        assert!(err.to_string().contains("insurance_required"));
    }

    #[test]
    fn test_untouched_forks_merge_to_base() {
        let base = trip();
        let merged = merge_forks(
            &base,
            &[("a".to_string(), base.fork()), ("b".to_string(), base.fork())],
        )
        .unwrap();
        assert_eq!(merged, base);
    }
}
