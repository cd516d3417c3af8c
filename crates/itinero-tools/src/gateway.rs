use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use itinero_core::config::RetryConfig;
use itinero_core::error::{ItineroError, Result};

use crate::registry::ToolRegistry;

/// The single boundary through which stages reach external services.
///
/// Each call gets a budget (`tokio::time::timeout`) and transient failures
/// get bounded retries with jittered exponential backoff. Non-transient
/// failures surface immediately. A timeout that survives the retry budget
/// is reported as a permanent tool failure.
pub struct ToolGateway {
    registry: ToolRegistry,
    retry: RetryConfig,
    default_timeout_ms: u64,
    cancel: CancellationToken,
}

impl ToolGateway {
    pub fn new(registry: ToolRegistry, retry: RetryConfig, default_timeout_ms: u64) -> Self {
        Self {
            registry,
            retry,
            default_timeout_ms,
            cancel: CancellationToken::new(),
        }
    }

    /// Share a cancellation token with the runner. Cancellation aborts
    /// in-flight waits and is terminal.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Invoke a tool by name with a structured input.
    pub async fn invoke(&self, name: &str, input: serde_json::Value) -> Result<serde_json::Value> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ItineroError::ToolNotFound(name.to_string()))?;

        let timeout_ms = tool.timeout_ms().unwrap_or(self.default_timeout_ms);
        let budget = Duration::from_millis(timeout_ms);
        let max_retries = self.retry.max_retries;

        let mut attempt = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(ItineroError::Cancelled);
            }

            debug!(tool = name, attempt, "Invoking tool");
            let call = tool.execute(input.clone());
            let result = tokio::select! {
                _ = self.cancel.cancelled() => Err(ItineroError::Cancelled),
                outcome = tokio::time::timeout(budget, call) => match outcome {
                    Ok(r) => r,
                    Err(_) => Err(ItineroError::ToolTimeout {
                        tool: name.to_string(),
                        timeout_ms,
                    }),
                },
            };

            match result {
                Ok(output) => {
                    if attempt > 0 {
                        info!(tool = name, attempt, "Tool succeeded after retry");
                    }
                    return Ok(output);
                }
                Err(ItineroError::Cancelled) => return Err(ItineroError::Cancelled),
                Err(e) => {
                    let can_retry = tool.retryable() && e.is_transient() && attempt < max_retries;
                    if !can_retry {
                        return Err(finalize_error(name, e, attempt, max_retries));
                    }
                    let backoff = calculate_backoff(attempt, &self.retry);
                    warn!(
                        tool = name,
                        attempt = attempt + 1,
                        max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying tool call"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// An exhausted timeout budget becomes a permanent tool failure.
fn finalize_error(tool: &str, error: ItineroError, attempt: u32, max_retries: u32) -> ItineroError {
    match error {
        ItineroError::ToolTimeout { timeout_ms, .. } if attempt >= max_retries => {
            ItineroError::Tool {
                tool: tool.to_string(),
                message: format!(
                    "timed out after {} attempts of {}ms each",
                    attempt + 1,
                    timeout_ms
                ),
                transient: false,
            }
        }
        other => other,
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = (config.initial_backoff_ms * 2u64.pow(attempt)).min(config.max_backoff_ms);
    // Jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use futures::future::BoxFuture;

    use crate::Tool;

    use super::*;

    /// Fails transiently `fail_count` times, then succeeds.
    struct FlakyTool {
        calls: Arc<AtomicU32>,
        fail_count: u32,
        transient: bool,
    }

    impl Tool for FlakyTool {
        fn name(&self) -> &str {
            "flaky"
        }
        fn description(&self) -> &str {
            "fails a few times"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        fn execute(&self, _input: serde_json::Value) -> BoxFuture<'_, Result<serde_json::Value>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let fail_count = self.fail_count;
            let transient = self.transient;
            Box::pin(async move {
                if n < fail_count {
                    Err(ItineroError::Tool {
                        tool: "flaky".into(),
                        message: "503 upstream".into(),
                        transient,
                    })
                } else {
                    Ok(serde_json::json!({"ok": true}))
                }
            })
        }
    }

    struct SlowTool;

    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "never finishes in budget"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        fn execute(&self, _input: serde_json::Value) -> BoxFuture<'_, Result<serde_json::Value>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(serde_json::json!({}))
            })
        }
        fn timeout_ms(&self) -> Option<u64> {
            Some(20)
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
        }
    }

    #[tokio::test]
    async fn test_transient_failures_retried_to_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(FlakyTool {
            calls: calls.clone(),
            fail_count: 2,
            transient: true,
        });
        let gateway = ToolGateway::new(registry, fast_retry(), 1000);

        let out = gateway.invoke("flaky", serde_json::json!({})).await.unwrap();
        assert_eq!(out, serde_json::json!({"ok": true}));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(FlakyTool {
            calls: calls.clone(),
            fail_count: 1,
            transient: false,
        });
        let gateway = ToolGateway::new(registry, fast_retry(), 1000);

        let err = gateway
            .invoke("flaky", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ItineroError::Tool { transient: false, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(FlakyTool {
            calls: calls.clone(),
            fail_count: 10,
            transient: true,
        });
        let gateway = ToolGateway::new(registry, fast_retry(), 1000);

        let err = gateway
            .invoke("flaky", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ItineroError::Tool { transient: true, .. }));
        // Initial attempt plus three retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_timeout_becomes_permanent_tool_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        let gateway = ToolGateway::new(registry, fast_retry(), 1000);

        let err = gateway
            .invoke("slow", serde_json::json!({}))
            .await
            .unwrap_err();
        match err {
            ItineroError::Tool {
                tool, transient, ..
            } => {
                assert_eq!(tool, "slow");
                assert!(!transient);
            }
            other => panic!("expected permanent tool failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let gateway = ToolGateway::new(ToolRegistry::new(), fast_retry(), 1000);
        let err = gateway
            .invoke("missing", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ItineroError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_cancellation_is_terminal() {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        let cancel = CancellationToken::new();
        let gateway =
            ToolGateway::new(registry, fast_retry(), 1000).with_cancellation(cancel.clone());

        cancel.cancel();
        let err = gateway
            .invoke("slow", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ItineroError::Cancelled));
    }
}
