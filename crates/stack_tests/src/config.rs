//! Harness configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use crate::errors::{HarnessError, Result};

/// Image tested when `TEST_IMAGE` is not set.
pub const DEFAULT_IMAGE: &str = "jupyter/base-notebook";

/// Port the notebook server listens on inside the container.
pub const NOTEBOOK_PORT: u16 = 8888;

const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STOP_TIMEOUT_SECS: u64 = 5;

/// Upper bound accepted for any configured timeout (one day).
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Configuration shared by every scenario in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Image under test
    pub image: String,
    /// Host port mapped to the notebook port of the container
    pub host_port: u16,
    /// How long the HTTP probe waits for the server to answer
    pub probe_timeout: Duration,
    /// Grace period given to a container before it is killed on teardown
    pub stop_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            host_port: NOTEBOOK_PORT,
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            stop_timeout: Duration::from_secs(DEFAULT_STOP_TIMEOUT_SECS),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from environment variables.
    ///
    /// Recognised variables, all optional:
    /// - `TEST_IMAGE`: image under test (default `jupyter/base-notebook`)
    /// - `TEST_HOST_PORT`: host port for the notebook server (default 8888)
    /// - `TEST_PROBE_TIMEOUT_SECS`: HTTP readiness window (default 30)
    /// - `TEST_STOP_TIMEOUT_SECS`: teardown grace period (default 5)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let image = match env::var("TEST_IMAGE") {
            Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => defaults.image,
        };

        let host_port = match env::var("TEST_HOST_PORT") {
            Ok(value) => parse_port(&value)?,
            Err(_) => defaults.host_port,
        };

        let probe_timeout = match env::var("TEST_PROBE_TIMEOUT_SECS") {
            Ok(value) => parse_seconds("TEST_PROBE_TIMEOUT_SECS", &value)?,
            Err(_) => defaults.probe_timeout,
        };

        let stop_timeout = match env::var("TEST_STOP_TIMEOUT_SECS") {
            Ok(value) => parse_seconds("TEST_STOP_TIMEOUT_SECS", &value)?,
            Err(_) => defaults.stop_timeout,
        };

        Ok(Self {
            image,
            host_port,
            probe_timeout,
            stop_timeout,
        })
    }

    /// URL the probe requests to check the notebook server.
    pub fn server_url(&self) -> String {
        format!("http://localhost:{}", self.host_port)
    }
}

/// Parse a host port, rejecting 0 since Docker would pick a random port.
pub fn parse_port(value: &str) -> Result<u16> {
    match value.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(HarnessError::Config(format!(
            "'{}' is not a valid host port",
            value
        ))),
        Ok(port) => Ok(port),
    }
}

fn parse_seconds(variable: &str, value: &str) -> Result<Duration> {
    let seconds = value.trim().parse::<u64>().map_err(|_| {
        HarnessError::Config(format!(
            "{} must be a whole number of seconds, got '{}'",
            variable, value
        ))
    })?;

    if seconds > MAX_TIMEOUT_SECS {
        return Err(HarnessError::Config(format!(
            "{} must be at most {} seconds, got {}",
            variable, MAX_TIMEOUT_SECS, seconds
        )));
    }

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
