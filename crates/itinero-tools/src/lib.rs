pub mod builtin;
pub mod gateway;
pub mod registry;

use futures::future::BoxFuture;

use itinero_core::Result;

/// An external lookup behind the tool gateway.
///
/// Tools are black boxes: structured JSON in, structured JSON out. The
/// caller validates the output against its expected shape by typed
/// deserialization; a mismatch is a `Validation` failure, never retried.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used by stages to invoke it).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given input.
    fn execute(&self, input: serde_json::Value) -> BoxFuture<'_, Result<serde_json::Value>>;

    /// Per-call budget in milliseconds. `None` uses the configured default.
    fn timeout_ms(&self) -> Option<u64> {
        None
    }

    /// Whether transient failures of this tool are eligible for retry.
    fn retryable(&self) -> bool {
        true
    }
}

pub use gateway::ToolGateway;
pub use registry::{ToolDefinition, ToolRegistry};
