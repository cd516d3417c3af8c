pub mod session;
pub mod stages;
pub mod summary;
pub mod workflow;

pub use session::{SessionId, SessionManager};
pub use workflow::trip_planning_workflow;
