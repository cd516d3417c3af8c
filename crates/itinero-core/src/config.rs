use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::RiskLevel;
use crate::error::{ItineroError, Result};

/// Top-level engine configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub retry: RetryConfig,

    /// Default per-call tool budget, for tools that don't declare their own.
    #[serde(default = "default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,

    /// Traveler nationality used for visa lookups.
    #[serde(default = "default_nationality")]
    pub nationality: String,

    #[serde(default)]
    pub insurance_policy: InsurancePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            tool_timeout_ms: default_tool_timeout_ms(),
            nationality: default_nationality(),
            insurance_policy: InsurancePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ItineroError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ItineroError::Config(format!("{}: {}", path.display(), e)))
    }
}

fn default_tool_timeout_ms() -> u64 {
    10_000
}
fn default_nationality() -> String {
    "US".to_string()
}

/// Retry policy for transient tool failures inside the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    250
}
fn default_max_backoff() -> u64 {
    5000
}

/// Risk level to insurance-required mapping.
///
/// The trigger thresholds are a policy decision, so they live in config
/// rather than in the insurance stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsurancePolicy {
    #[serde(default)]
    pub low: bool,
    #[serde(default = "default_true")]
    pub medium: bool,
    #[serde(default = "default_true")]
    pub high: bool,
}

impl Default for InsurancePolicy {
    fn default() -> Self {
        Self {
            low: false,
            medium: true,
            high: true,
        }
    }
}

impl InsurancePolicy {
    pub fn requires(&self, risk: RiskLevel) -> bool {
        match risk {
            RiskLevel::Low => self.low,
            RiskLevel::Medium => self.medium,
            RiskLevel::High => self.high,
        }
    }
}

fn default_true() -> bool {
    true
}
