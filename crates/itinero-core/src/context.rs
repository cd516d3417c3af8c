use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ItineroError, Result};

/// Category-to-score mapping for a traveler (e.g. budget, nature, history).
pub type PreferenceVector = BTreeMap<String, f64>;

/// Visa/entry compliance status for the trip.
///
/// Transitions only forward, from `Pending` to `Requirement` or `NotRequired`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    #[default]
    Pending,
    Requirement,
    NotRequired,
}

/// Risk level attached to a compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Output of a visa/compliance check, folded into the [`TripContext`] by the
/// stage that produced it and consumed by the next stage in its group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub document_type: String,
    pub status: ComplianceStatus,
    pub risk_level: RiskLevel,
    pub next_action: String,
}

/// One day-segment of the base itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItinerarySegment {
    /// Day number, contiguous from 1.
    pub day: u32,
    pub poi_name: String,
    /// Human-readable rationale tied to a preference dimension.
    pub justification: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
}

impl ItinerarySegment {
    pub fn new(
        day: u32,
        poi_name: impl Into<String>,
        justification: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            day,
            poi_name: poi_name.into(),
            justification: justification.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// An opaque discovered point of interest. The engine stores these without
/// interpreting the detail payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub name: String,
    pub detail: serde_json::Value,
}

/// A single transport option (one mode, or one member's local plan).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportOption {
    pub price: f64,
    pub duration_hours: f64,
    pub justification: String,
}

/// Comparison record for one transport scope ("intercity", "local").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportComparison {
    pub options: BTreeMap<String, TransportOption>,
    pub best_pick: Option<String>,
    pub justification: String,
}

/// A context field name, used in stage read/write declarations and by the
/// merge resolver. `Transport` carries the `transport_options` key it owns,
/// so two stages can write different transport scopes without conflicting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    TripId,
    Destination,
    GroupMembers,
    TravelDates,
    UserPreferences,
    GroupPreferences,
    ComplianceStatus,
    RiskLevel,
    VisaDeadline,
    InsuranceRequired,
    DiscoveredPois,
    Itinerary,
    Transport(String),
    CostEstimate,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TripId => write!(f, "trip_id"),
            Self::Destination => write!(f, "destination"),
            Self::GroupMembers => write!(f, "group_members"),
            Self::TravelDates => write!(f, "travel_dates"),
            Self::UserPreferences => write!(f, "user_preferences"),
            Self::GroupPreferences => write!(f, "group_preferences"),
            Self::ComplianceStatus => write!(f, "compliance_status"),
            Self::RiskLevel => write!(f, "risk_level"),
            Self::VisaDeadline => write!(f, "visa_deadline"),
            Self::InsuranceRequired => write!(f, "insurance_required"),
            Self::DiscoveredPois => write!(f, "discovered_pois"),
            Self::Itinerary => write!(f, "itinerary"),
            Self::Transport(key) => write!(f, "transport_options.{}", key),
            Self::CostEstimate => write!(f, "cost_estimate"),
        }
    }
}

/// The shared trip-planning record threaded through the workflow.
///
/// A parallel branch receives a fork (clone); its writes become visible to
/// the rest of the workflow only through the merge resolver at the join
/// barrier. Maps are BTree-ordered so diffs and merges are deterministic.
///
/// `group_preferences` is derived from `user_preferences`; the
/// personalization stage recomputes it (via [`TripContext::average_preferences`])
/// after profile lookups change the member entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripContext {
    pub trip_id: String,
    pub destination: String,
    pub group_members: Vec<String>,
    #[serde(default)]
    pub travel_dates: Option<(NaiveDate, NaiveDate)>,
    #[serde(default)]
    pub user_preferences: BTreeMap<String, PreferenceVector>,
    #[serde(default)]
    pub group_preferences: Option<PreferenceVector>,
    #[serde(default)]
    pub compliance_status: ComplianceStatus,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub visa_deadline: Option<String>,
    #[serde(default)]
    pub insurance_required: bool,
    #[serde(default)]
    pub discovered_pois: Vec<PointOfInterest>,
    #[serde(default)]
    pub itinerary: Vec<ItinerarySegment>,
    #[serde(default)]
    pub transport_options: BTreeMap<String, TransportComparison>,
    #[serde(default)]
    pub cost_estimate: f64,
}

impl TripContext {
    /// Create a context with its identity fields set.
    ///
    /// Member ids must be unique; `trip_id` and `group_members` are immutable
    /// once set (enforced by write-set checks at stage boundaries).
    pub fn new(
        trip_id: impl Into<String>,
        destination: impl Into<String>,
        group_members: Vec<String>,
        travel_dates: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for member in &group_members {
            if !seen.insert(member.as_str()) {
                return Err(ItineroError::Validation(format!(
                    "duplicate group member '{}'",
                    member
                )));
            }
        }
        if let Some((start, end)) = travel_dates {
            if end < start {
                return Err(ItineroError::Validation(format!(
                    "travel end date {} precedes start date {}",
                    end, start
                )));
            }
        }

        Ok(Self {
            trip_id: trip_id.into(),
            destination: destination.into(),
            group_members,
            travel_dates,
            user_preferences: BTreeMap::new(),
            group_preferences: None,
            compliance_status: ComplianceStatus::Pending,
            risk_level: None,
            visa_deadline: None,
            insurance_required: false,
            discovered_pois: Vec::new(),
            itinerary: Vec::new(),
            transport_options: BTreeMap::new(),
            cost_estimate: 0.0,
        })
    }

    /// Independent fork for a parallel branch.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Store one member's preference vector. Entries are never removed.
    pub fn set_member_preferences(&mut self, member: impl Into<String>, vector: PreferenceVector) {
        self.user_preferences.insert(member.into(), vector);
    }

    /// Element-wise average of all member preference vectors.
    ///
    /// Categories missing from a member count as 0 for that member, so every
    /// category is averaged over the full group size.
    pub fn average_preferences(&self) -> Option<PreferenceVector> {
        if self.user_preferences.is_empty() {
            return None;
        }
        let count = self.user_preferences.len() as f64;
        let mut sums: PreferenceVector = BTreeMap::new();
        for vector in self.user_preferences.values() {
            for (category, score) in vector {
                *sums.entry(category.clone()).or_insert(0.0) += score;
            }
        }
        Some(sums.into_iter().map(|(k, v)| (k, v / count)).collect())
    }

    /// Advance the compliance status. Backward transitions are defects.
    pub fn set_compliance(&mut self, status: ComplianceStatus) -> Result<()> {
        match (self.compliance_status, status) {
            (ComplianceStatus::Pending, _) => {
                self.compliance_status = status;
                Ok(())
            }
            (current, next) if current == next => Ok(()),
            (current, next) => Err(ItineroError::Validation(format!(
                "compliance status cannot transition {:?} -> {:?}",
                current, next
            ))),
        }
    }

    /// Replace the base itinerary, enforcing day numbering contiguous from 1.
    pub fn set_itinerary(&mut self, segments: Vec<ItinerarySegment>) -> Result<()> {
        let mut current = 0u32;
        for segment in &segments {
            if segment.day >= 1 && segment.day == current {
                continue;
            }
            if segment.day == current + 1 {
                current += 1;
                continue;
            }
            return Err(ItineroError::Validation(format!(
                "itinerary day {} breaks contiguity (expected {} or {})",
                segment.day,
                current.max(1),
                current + 1
            )));
        }
        self.itinerary = segments;
        Ok(())
    }

    /// Add to the running cost estimate. The estimate is monotonically
    /// non-decreasing; a negative delta is a defect.
    pub fn add_cost(&mut self, delta: f64) -> Result<()> {
        if delta < 0.0 || !delta.is_finite() {
            return Err(ItineroError::Validation(format!(
                "cost estimate delta must be non-negative and finite, got {}",
                delta
            )));
        }
        self.cost_estimate += delta;
        Ok(())
    }

    /// Whether a field holds a usable value, for read-dependency checks.
    pub fn is_populated(&self, field: &Field) -> bool {
        match field {
            Field::TripId => !self.trip_id.is_empty(),
            Field::Destination => !self.destination.is_empty(),
            Field::GroupMembers => !self.group_members.is_empty(),
            Field::TravelDates => self.travel_dates.is_some(),
            Field::UserPreferences => !self.user_preferences.is_empty(),
            Field::GroupPreferences => self.group_preferences.is_some(),
            Field::ComplianceStatus => self.compliance_status != ComplianceStatus::Pending,
            Field::RiskLevel => self.risk_level.is_some(),
            Field::VisaDeadline => self.visa_deadline.is_some(),
            Field::InsuranceRequired => true,
            Field::DiscoveredPois => !self.discovered_pois.is_empty(),
            Field::Itinerary => !self.itinerary.is_empty(),
            Field::Transport(key) => self.transport_options.contains_key(key),
            Field::CostEstimate => true,
        }
    }

    /// Fields whose value differs from `base`.
    ///
    /// Used both to enforce leaf write-sets and to drive the merge resolver:
    /// a field counts as touched only if its value actually changed.
    /// Transport keys diff individually so sibling branches owning different
    /// scopes stay disjoint.
    pub fn diff(&self, base: &Self) -> BTreeSet<Field> {
        let mut touched = BTreeSet::new();
        if self.trip_id != base.trip_id {
            touched.insert(Field::TripId);
        }
        if self.destination != base.destination {
            touched.insert(Field::Destination);
        }
        if self.group_members != base.group_members {
            touched.insert(Field::GroupMembers);
        }
        if self.travel_dates != base.travel_dates {
            touched.insert(Field::TravelDates);
        }
        if self.user_preferences != base.user_preferences {
            touched.insert(Field::UserPreferences);
        }
        if self.group_preferences != base.group_preferences {
            touched.insert(Field::GroupPreferences);
        }
        if self.compliance_status != base.compliance_status {
            touched.insert(Field::ComplianceStatus);
        }
        if self.risk_level != base.risk_level {
            touched.insert(Field::RiskLevel);
        }
        if self.visa_deadline != base.visa_deadline {
            touched.insert(Field::VisaDeadline);
        }
        if self.insurance_required != base.insurance_required {
            touched.insert(Field::InsuranceRequired);
        }
        if self.discovered_pois != base.discovered_pois {
            touched.insert(Field::DiscoveredPois);
        }
        if self.itinerary != base.itinerary {
            touched.insert(Field::Itinerary);
        }
        if self.cost_estimate != base.cost_estimate {
            touched.insert(Field::CostEstimate);
        }
        for (key, value) in &self.transport_options {
            if base.transport_options.get(key) != Some(value) {
                touched.insert(Field::Transport(key.clone()));
            }
        }
        for key in base.transport_options.keys() {
            if !self.transport_options.contains_key(key) {
                touched.insert(Field::Transport(key.clone()));
            }
        }
        touched
    }

    /// Copy one field's value from a fork into this context.
    pub fn take_field(&mut self, field: &Field, from: &Self) {
        match field {
            Field::TripId => self.trip_id = from.trip_id.clone(),
            Field::Destination => self.destination = from.destination.clone(),
            Field::GroupMembers => self.group_members = from.group_members.clone(),
            Field::TravelDates => self.travel_dates = from.travel_dates,
            Field::UserPreferences => self.user_preferences = from.user_preferences.clone(),
            Field::GroupPreferences => self.group_preferences = from.group_preferences.clone(),
            Field::ComplianceStatus => self.compliance_status = from.compliance_status,
            Field::RiskLevel => self.risk_level = from.risk_level,
            Field::VisaDeadline => self.visa_deadline = from.visa_deadline.clone(),
            Field::InsuranceRequired => self.insurance_required = from.insurance_required,
            Field::DiscoveredPois => self.discovered_pois = from.discovered_pois.clone(),
            Field::Itinerary => self.itinerary = from.itinerary.clone(),
            Field::Transport(key) => match from.transport_options.get(key) {
                Some(value) => {
                    self.transport_options.insert(key.clone(), value.clone());
                }
                None => {
                    self.transport_options.remove(key);
                }
            },
            Field::CostEstimate => self.cost_estimate = from.cost_estimate,
        }
    }

    /// Fields populated before any stage runs, used as the root of the
    /// static read-dependency validation.
    pub fn initial_fields(&self) -> BTreeSet<Field> {
        let all = [
            Field::TripId,
            Field::Destination,
            Field::GroupMembers,
            Field::TravelDates,
            Field::UserPreferences,
            Field::GroupPreferences,
            Field::ComplianceStatus,
            Field::RiskLevel,
            Field::VisaDeadline,
            Field::DiscoveredPois,
            Field::Itinerary,
        ];
        let mut populated: BTreeSet<Field> = all
            .into_iter()
            .filter(|f| self.is_populated(f))
            .collect();
        populated.insert(Field::InsuranceRequired);
        populated.insert(Field::CostEstimate);
        for key in self.transport_options.keys() {
            populated.insert(Field::Transport(key.clone()));
        }
        populated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TripContext {
        TripContext::new(
            "TRIP-001",
            "Switzerland",
            vec!["alice".into(), "bob".into()],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_members_rejected() {
        let err = TripContext::new("t", "x", vec!["a".into(), "a".into()], None).unwrap_err();
        assert!(matches!(err, ItineroError::Validation(_)));
    }

    #[test]
    fn test_inverted_dates_rejected() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let err = TripContext::new("t", "x", vec!["a".into()], Some((start, end))).unwrap_err();
        assert!(matches!(err, ItineroError::Validation(_)));
    }

    #[test]
    fn test_average_preferences() {
        let mut c = ctx();
        c.set_member_preferences(
            "alice",
            BTreeMap::from([("budget".into(), 0.2), ("nature".into(), 0.9)]),
        );
        c.set_member_preferences(
            "bob",
            BTreeMap::from([("budget".into(), 0.8), ("nature".into(), 0.3)]),
        );

        let avg = c.average_preferences().unwrap();
        assert!((avg["budget"] - 0.5).abs() < 1e-9);
        assert!((avg["nature"] - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_average_covers_missing_categories() {
        let mut c = ctx();
        c.set_member_preferences("alice", BTreeMap::from([("nature".into(), 1.0)]));
        c.set_member_preferences("bob", BTreeMap::from([("budget".into(), 0.5)]));

        let avg = c.average_preferences().unwrap();
        assert!((avg["nature"] - 0.5).abs() < 1e-9);
        assert!((avg["budget"] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_compliance_transitions_forward_only() {
        let mut c = ctx();
        c.set_compliance(ComplianceStatus::Requirement).unwrap();
        // Idempotent re-set is fine
        c.set_compliance(ComplianceStatus::Requirement).unwrap();
        // Backward is a defect
        assert!(c.set_compliance(ComplianceStatus::Pending).is_err());
        assert!(c.set_compliance(ComplianceStatus::NotRequired).is_err());
    }

    #[test]
    fn test_itinerary_contiguity() {
        let mut c = ctx();
        c.set_itinerary(vec![
            ItinerarySegment::new(1, "a", "j", 0.9),
            ItinerarySegment::new(1, "b", "j", 0.9),
            ItinerarySegment::new(2, "c", "j", 0.9),
        ])
        .unwrap();

        let err = c
            .set_itinerary(vec![
                ItinerarySegment::new(1, "a", "j", 0.9),
                ItinerarySegment::new(3, "b", "j", 0.9),
            ])
            .unwrap_err();
        assert!(matches!(err, ItineroError::Validation(_)));
    }

    #[test]
    fn test_cost_monotonic() {
        let mut c = ctx();
        c.add_cost(120.0).unwrap();
        c.add_cost(0.0).unwrap();
        assert!(c.add_cost(-5.0).is_err());
        assert!((c.cost_estimate - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(ItinerarySegment::new(1, "a", "j", 1.5).confidence, 1.0);
        assert_eq!(ItinerarySegment::new(1, "a", "j", -0.1).confidence, 0.0);
    }

    #[test]
    fn test_diff_and_take_field() {
        let base = ctx();
        let mut fork = base.fork();
        fork.insurance_required = true;
        fork.transport_options.insert(
            "intercity".into(),
            TransportComparison {
                justification: "train".into(),
                ..Default::default()
            },
        );

        let touched = fork.diff(&base);
        assert_eq!(
            touched,
            BTreeSet::from([
                Field::InsuranceRequired,
                Field::Transport("intercity".into())
            ])
        );

        let mut merged = base.fork();
        for field in &touched {
            merged.take_field(field, &fork);
        }
        assert_eq!(merged, fork);
    }

    #[test]
    fn test_transport_keys_diff_independently() {
        let base = ctx();
        let mut a = base.fork();
        a.transport_options
            .insert("intercity".into(), TransportComparison::default());
        let mut b = base.fork();
        b.transport_options
            .insert("local".into(), TransportComparison::default());

        assert_eq!(
            a.diff(&base),
            BTreeSet::from([Field::Transport("intercity".into())])
        );
        assert_eq!(
            b.diff(&base),
            BTreeSet::from([Field::Transport("local".into())])
        );
    }

    #[test]
    fn test_initial_fields() {
        let c = ctx();
        let fields = c.initial_fields();
        assert!(fields.contains(&Field::TripId));
        assert!(fields.contains(&Field::Destination));
        assert!(fields.contains(&Field::GroupMembers));
        assert!(!fields.contains(&Field::UserPreferences));
        assert!(!fields.contains(&Field::Itinerary));
    }
}
