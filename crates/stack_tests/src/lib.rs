//! Start-up test harness for the Jupyter docker-stacks images.
//!
//! Launches containers of an image under test with varying environments and
//! checks what they print, whether the notebook server answers over HTTP, and
//! which process runs as PID 1. See [`scenarios`] for the checks themselves.

pub mod config;
pub mod container;
pub mod errors;
pub mod fixtures;
pub mod log_assertions;
pub mod probe;
pub mod report;
pub mod scenarios;

// Re-export commonly used types for convenience
pub use config::HarnessConfig;
pub use container::{
    ContainerConfig, ContainerRunner, DockerContainer, DockerRunner, ExecResult, RunningContainer,
};
pub use errors::{AssertionFailure, HarnessError, Result};
pub use fixtures::{InitProcessExpectation, StartNotebookCase, START_NOTEBOOK_CASES, TINI_INIT_PROCESS};
pub use probe::{HttpProbe, ProbeResponse, ReqwestProbe};
pub use scenarios::{Scenario, ScenarioDetails, ScenarioResult, ScenarioRunner};

/// Initialize logging for test runs.
///
/// Honours `RUST_LOG`; defaults to `info`. Safe to call more than once, later
/// calls are ignored.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}
