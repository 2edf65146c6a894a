//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "REQCHECK";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Timeout in seconds from REQCHECK_TIMEOUT
    pub timeout: Option<u64>,
    /// Parallel from REQCHECK_PARALLEL
    pub parallel: Option<bool>,
    /// Workers from REQCHECK_CONCURRENCY
    pub concurrency: Option<usize>,
    /// Fail-fast from REQCHECK_FAIL_FAST
    pub fail_fast: Option<bool>,
    /// Drain timeout from REQCHECK_DRAIN_TIMEOUT_MS
    pub drain_timeout_ms: Option<u64>,
    /// Log level from REQCHECK_LOG_LEVEL
    pub log_level: Option<String>,
    /// Config file from REQCHECK_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            timeout: get_env_parse("TIMEOUT"),
            parallel: get_env_bool("PARALLEL"),
            concurrency: get_env_parse("CONCURRENCY"),
            fail_fast: get_env_bool("FAIL_FAST"),
            drain_timeout_ms: get_env_parse("DRAIN_TIMEOUT_MS"),
            log_level: get_env("LOG_LEVEL"),
            config_file: get_env("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.timeout.is_some()
            || self.parallel.is_some()
            || self.concurrency.is_some()
            || self.fail_fast.is_some()
            || self.drain_timeout_ms.is_some()
            || self.log_level.is_some()
            || self.config_file.is_some()
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| parse_bool(&v))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "enabled"
    )
}

/// Serializes tests that touch the process environment
#[cfg(test)]
static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Builder for setting environment variables in tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(mut self, name: &str, value: impl ToString) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_{name}"), value.to_string()));
        self
    }

    pub fn timeout(self, secs: u64) -> Self {
        self.set("TIMEOUT", secs)
    }

    pub fn parallel(self, parallel: bool) -> Self {
        self.set("PARALLEL", parallel)
    }

    pub fn concurrency(self, workers: usize) -> Self {
        self.set("CONCURRENCY", workers)
    }

    pub fn fail_fast(self, fail_fast: bool) -> Self {
        self.set("FAIL_FAST", fail_fast)
    }

    pub fn drain_timeout_ms(self, millis: u64) -> Self {
        self.set("DRAIN_TIMEOUT_MS", millis)
    }

    pub fn log_level(self, level: &str) -> Self {
        self.set("LOG_LEVEL", level)
    }

    pub fn config_file(self, path: &str) -> Self {
        self.set("CONFIG", path)
    }

    /// Apply the variables and return a guard that restores them on drop.
    ///
    /// The guard also holds a process-wide lock, so scoped environments
    /// from concurrent tests never overlap.
    pub fn apply_scoped(self) -> EnvGuard {
        let lock = ENV_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard {
            previous,
            _lock: lock,
        }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}
