//! The trip-planning leaf stages.
//!
//! Each stage declares the context fields it reads and writes; the engine
//! enforces both at composition time and at runtime.

pub mod compliance;
pub mod discovery;
pub mod itinerary;
pub mod personalize;
pub mod profile;
pub mod transport;

pub use compliance::{InsuranceRiskStage, VisaCheckStage};
pub use discovery::PlaceDiscoveryStage;
pub use itinerary::ItineraryStage;
pub use personalize::PersonalizationStage;
pub use profile::TravelerProfileStage;
pub use transport::{LocalLogisticsStage, SegmentTransportStage};
