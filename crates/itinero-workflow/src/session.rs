use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use itinero_core::error::{ItineroError, Result};
use itinero_core::TripContext;
use itinero_engine::{Stage, WorkflowReport, WorkflowRunner};

use crate::summary;

/// Opaque session identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one workflow run against a session.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: WorkflowReport,
    pub summary: String,
}

/// The workflow boundary consumed by a front-end.
///
/// A session holds exactly one [`TripContext`] snapshot, the latest; the
/// in-memory map stands in for whatever persistence the front-end owns.
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, TripContext>>,
    runner: WorkflowRunner,
    workflow: Stage,
}

impl SessionManager {
    pub fn new(runner: WorkflowRunner, workflow: Stage) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            runner,
            workflow,
        })
    }

    /// Create a session with its identity fields set.
    pub async fn create_session(
        &self,
        members: Vec<String>,
        destination: impl Into<String>,
        travel_dates: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<SessionId> {
        let id = SessionId::new();
        let context = TripContext::new(
            format!("TRIP-{}", &id.0[..8]),
            destination,
            members,
            travel_dates,
        )?;
        info!(session = %id, trip = %context.trip_id, "Created session");
        self.sessions.write().await.insert(id.clone(), context);
        Ok(id)
    }

    /// Run the workflow against a session's latest snapshot.
    ///
    /// On success the final context becomes the stored snapshot; on failure
    /// the last consistent snapshot is stored instead, so the session never
    /// holds a half-written state.
    pub async fn run_workflow(&self, id: &SessionId, request: &str) -> Result<RunOutcome> {
        let initial = self
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ItineroError::Validation(format!("unknown session '{}'", id)))?;

        info!(session = %id, request = %request, "Running trip planning workflow");
        let report = self.runner.run(&self.workflow, initial).await;

        self.sessions
            .write()
            .await
            .insert(id.clone(), report.context().clone());

        let summary = summary::render(&report);
        Ok(RunOutcome { report, summary })
    }

    /// The session's latest context snapshot.
    pub async fn snapshot(&self, id: &SessionId) -> Option<TripContext> {
        self.sessions.read().await.get(id).cloned()
    }
}
