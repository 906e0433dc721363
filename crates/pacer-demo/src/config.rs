use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use pacer_model::BackoffConfig;
use pacer_observe::{LoggerConfig, LoggerLevel};

/// Env variable overriding the logger filter.
pub const ENV_LOG: &str = "PACER_LOG";

/// Env variable with the number of simulated failures before success.
pub const ENV_FAILURES: &str = "PACER_FAILURES";

pub const DEFAULT_FAILURES: u32 = 3;

/// File layout:
/// ```json
/// { "logger": { "format": "json" }, "backoff": { "maxAttempts": 5, "minMs": 200 } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub logger: LoggerConfig,
    pub backoff: BackoffConfig,
}

impl DemoConfig {
    /// Loads the config file at `path`, or defaults when no path is given.
    pub async fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Applies a `PACER_LOG` style override to the logger filter.
    pub fn with_level_override(mut self, level: Option<&str>) -> anyhow::Result<Self> {
        if let Some(level) = level {
            let level = LoggerLevel::new(level).with_context(|| format!("invalid {ENV_LOG}"))?;
            self.logger = self.logger.with_level(level);
        }
        Ok(self)
    }
}

/// Parses the `PACER_FAILURES` value.
pub fn failures_from(raw: Option<&str>) -> anyhow::Result<u32> {
    match raw {
        None => Ok(DEFAULT_FAILURES),
        Some(s) => s
            .trim()
            .parse()
            .with_context(|| format!("invalid {ENV_FAILURES}: {s:?}")),
    }
}
