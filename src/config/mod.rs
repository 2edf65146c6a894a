//! Configuration module
//!
//! Runner settings loaded from YAML or JSON files with environment variable
//! overrides.

mod env;

pub use env::EnvConfig;
#[cfg(test)]
pub(crate) use env::EnvBuilder;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::utils::LogLevel;

/// Worker count used when none is configured
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Runner configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Default request timeout in seconds
    pub timeout_secs: u64,

    /// Run tests on the worker pool instead of one at a time
    pub parallel: bool,

    /// Parallel workers; 0 means the default
    pub concurrency: usize,

    /// Stop scheduling tests after the first failure
    pub fail_fast: bool,

    /// Wait for in-flight results after cancellation, in milliseconds
    pub drain_timeout_ms: u64,

    /// Client-wide redirect limit, see [`crate::http::redirect_policy`]
    pub max_redirects: Option<i32>,

    pub accept_invalid_certs: bool,

    pub log_level: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            parallel: false,
            concurrency: DEFAULT_CONCURRENCY,
            fail_fast: false,
            drain_timeout_ms: 500,
            max_redirects: None,
            accept_invalid_certs: false,
            log_level: "info".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = if is_yaml(path) {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON config")?
        };

        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Defaults, then the file named by `REQCHECK_CONFIG`, then environment
    /// overrides
    pub fn resolve() -> Result<Self> {
        let env = EnvConfig::load();
        let base = match &env.config_file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        let config = base.with_env(&env);
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides
    pub fn with_env(mut self, env: &EnvConfig) -> Self {
        if let Some(timeout) = env.timeout {
            self.timeout_secs = timeout;
        }
        if let Some(parallel) = env.parallel {
            self.parallel = parallel;
        }
        if let Some(concurrency) = env.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(fail_fast) = env.fail_fast {
            self.fail_fast = fail_fast;
        }
        if let Some(drain) = env.drain_timeout_ms {
            self.drain_timeout_ms = drain;
        }
        if let Some(level) = &env.log_level {
            self.log_level = level.clone();
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }
        if LogLevel::from_str(&self.log_level).is_none() {
            bail!("unknown log level '{}'", self.log_level);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency == 0 {
            DEFAULT_CONCURRENCY
        } else {
            self.concurrency
        }
    }

    /// Configured log level, `info` when unrecognised
    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_str(&self.log_level).unwrap_or_default()
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
