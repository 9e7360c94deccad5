//! Fixed inputs of the start-up scenarios.
//!
//! The server-variant cases are a static table rather than generated tests:
//! one scenario function runs once per row. Precedence of `JUPYTER_CMD` over
//! `JUPYTER_ENABLE_LAB` lives only in these rows.

use crate::container::ContainerConfig;

/// Entrypoint that starts the notebook server.
pub const START_NOTEBOOK_COMMAND: &str = "start-notebook.sh";

/// Entrypoint that only prepares the container and runs its arguments.
pub const START_COMMAND: &str = "start.sh";

/// One row of the server-variant selection table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartNotebookCase {
    /// Environment passed to the container, empty for none
    pub environment: &'static [&'static str],
    /// Server variant that must be launched
    pub expected_server: &'static str,
    /// Whether the deprecation warning must be printed
    pub expected_warning: bool,
}

impl StartNotebookCase {
    /// Human-readable case label, used in scenario names.
    pub fn label(&self) -> String {
        if self.environment.is_empty() {
            "default".to_string()
        } else {
            self.environment.join(",")
        }
    }

    pub fn container_config(&self) -> ContainerConfig {
        ContainerConfig::new([START_NOTEBOOK_COMMAND])
            .with_environment(self.environment.iter().copied())
            .interactive(true)
    }
}

/// Server-variant selection cases.
pub const START_NOTEBOOK_CASES: [StartNotebookCase; 6] = [
    StartNotebookCase {
        environment: &["JUPYTER_ENABLE_LAB=yes"],
        expected_server: "lab",
        expected_warning: true,
    },
    StartNotebookCase {
        environment: &[],
        expected_server: "lab",
        expected_warning: false,
    },
    StartNotebookCase {
        environment: &["JUPYTER_CMD=lab"],
        expected_server: "lab",
        expected_warning: false,
    },
    StartNotebookCase {
        environment: &["JUPYTER_CMD=notebook"],
        expected_server: "notebook",
        expected_warning: false,
    },
    StartNotebookCase {
        environment: &["JUPYTER_CMD=server"],
        expected_server: "server",
        expected_warning: false,
    },
    StartNotebookCase {
        environment: &["JUPYTER_CMD=nbclassic"],
        expected_server: "nbclassic",
        expected_warning: false,
    },
];

/// Which process must hold a given PID inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitProcessExpectation {
    pub pid: u32,
    pub command: &'static str,
}

impl InitProcessExpectation {
    /// Process-table query printing only the command name of the PID.
    pub fn query(&self) -> String {
        format!("ps -p {} -o comm=", self.pid)
    }

    pub fn container_config(&self) -> ContainerConfig {
        ContainerConfig::new([START_COMMAND]).interactive(true)
    }
}

/// `tini` must be the init process of every image.
pub const TINI_INIT_PROCESS: InitProcessExpectation = InitProcessExpectation {
    pid: 1,
    command: "tini",
};

#[cfg(test)]
#[path = "fixtures_tests.rs"]
mod tests;
