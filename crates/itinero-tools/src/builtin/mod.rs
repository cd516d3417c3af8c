//! The four trip-planning tools.
//!
//! These stand in for the external services (profile store, verified-POI
//! index, visa API, route aggregator) with deterministic data, so workflows
//! run reproducibly without network access.

pub mod places;
pub mod preferences;
pub mod routes;
pub mod visa;

pub use places::VerifiedPoiTool;
pub use preferences::PreferenceVectorTool;
pub use routes::MultimodalRouteTool;
pub use visa::VisaCheckTool;
