//! Error types for the container start-up harness.
//!
//! Every failure a scenario can hit is one variant of [`HarnessError`]. There
//! are no retries and no partial failures: the first error ends the scenario
//! and is reported as the scenario's outcome.

use std::fmt;
use std::time::Duration;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors that can occur while driving a container scenario.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The container engine could not create or start the container.
    ///
    /// Typical causes are a missing image, a host port that is already bound,
    /// or an unreachable Docker daemon. This aborts the scenario.
    #[error("Failed to start container from image '{image}': {reason}")]
    ContainerStart { image: String, reason: String },

    /// A command could not be executed inside the container.
    ///
    /// Raised when the container is no longer running or when the engine
    /// rejects the exec request.
    #[error("Failed to execute '{command}' in container {container_id}: {reason}")]
    Exec {
        container_id: String,
        command: String,
        reason: String,
    },

    /// The container's log stream could not be read.
    #[error("Failed to read logs of container {container_id}: {reason}")]
    Logs { container_id: String, reason: String },

    /// No HTTP response arrived before the readiness timeout expired.
    #[error("No response from {url} within {}s", .timeout.as_secs_f64())]
    ProbeTimeout { url: String, timeout: Duration },

    /// The HTTP client failed for a reason unrelated to readiness.
    #[error("HTTP probe of {url} failed: {reason}")]
    Probe { url: String, reason: String },

    /// Captured output did not satisfy an expectation.
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),

    /// The container could not be removed after the scenario.
    #[error("Failed to remove container {container_id}: {reason}")]
    Teardown { container_id: String, reason: String },

    /// The harness configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Short machine-friendly name of the error kind, used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::ContainerStart { .. } => "container_start",
            HarnessError::Exec { .. } => "exec",
            HarnessError::Logs { .. } => "logs",
            HarnessError::ProbeTimeout { .. } => "probe_timeout",
            HarnessError::Probe { .. } => "probe",
            HarnessError::Assertion(_) => "assertion",
            HarnessError::Teardown { .. } => "teardown",
            HarnessError::Config(_) => "config",
            HarnessError::Io(_) => "io",
        }
    }
}

/// An expectation on captured container output that did not hold.
///
/// The full captured text travels with the failure so that the report shows
/// exactly what the container printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    pub message: String,
    pub captured: String,
}

impl AssertionFailure {
    pub fn new(message: impl Into<String>, captured: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            captured: captured.into(),
        }
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Assertion failed: {}", self.message)?;
        if !self.captured.is_empty() {
            write!(f, "\n--- captured output ---\n{}", self.captured.trim_end())?;
        }
        Ok(())
    }
}

impl std::error::Error for AssertionFailure {}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
