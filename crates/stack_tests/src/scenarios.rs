//! Start-up scenarios for the notebook-stack images.
//!
//! Each scenario owns exactly one container: it is started, inspected and
//! removed before the scenario returns, so no container outlives its scenario
//! and scenarios never share state. The container engine and the HTTP client
//! are injected as [`ContainerRunner`] and [`HttpProbe`].

use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::container::{ContainerConfig, ContainerRunner, RunningContainer};
use crate::errors::{AssertionFailure, HarnessError, Result};
use crate::fixtures::{
    InitProcessExpectation, StartNotebookCase, START_NOTEBOOK_CASES, TINI_INIT_PROCESS,
};
use crate::log_assertions::{
    assert_clean_output, assert_command_launched, assert_no_errors, assert_warnings,
};
use test_utils::generate_test_container_name;

/// A runnable scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// The right server variant starts for a given environment
    StartNotebook(StartNotebookCase),
    /// The expected init process holds its PID
    TiniEntrypoint(InitProcessExpectation),
}

impl Scenario {
    /// Every server-variant case.
    pub fn start_notebook_cases() -> Vec<Scenario> {
        START_NOTEBOOK_CASES
            .iter()
            .copied()
            .map(Scenario::StartNotebook)
            .collect()
    }

    /// Every scenario, server-variant cases first.
    pub fn all() -> Vec<Scenario> {
        let mut scenarios = Self::start_notebook_cases();
        scenarios.push(Scenario::TiniEntrypoint(TINI_INIT_PROCESS));
        scenarios
    }

    pub fn name(&self) -> String {
        match self {
            Scenario::StartNotebook(case) => format!("start-notebook[{}]", case.label()),
            Scenario::TiniEntrypoint(expectation) => {
                format!("{}-entrypoint", expectation.command)
            }
        }
    }

    pub fn container_config(&self) -> ContainerConfig {
        match self {
            Scenario::StartNotebook(case) => case.container_config(),
            Scenario::TiniEntrypoint(expectation) => expectation.container_config(),
        }
    }
}

/// What happened during a scenario, step by step.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScenarioDetails {
    pub container_started: bool,
    /// Status code returned by the server, when probed
    pub probe_status: Option<u16>,
    pub logs_checked: bool,
    pub container_removed: bool,
}

/// Outcome of one scenario.
#[derive(Debug)]
pub struct ScenarioResult {
    pub scenario: Scenario,
    pub container: Option<String>,
    pub error: Option<HarnessError>,
    pub duration: Duration,
    pub details: ScenarioDetails,
}

impl ScenarioResult {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Drives scenarios against injected collaborators.
pub struct ScenarioRunner<'a> {
    runner: &'a dyn ContainerRunner,
    probe: &'a dyn crate::probe::HttpProbe,
    server_url: String,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(
        runner: &'a dyn ContainerRunner,
        probe: &'a dyn crate::probe::HttpProbe,
        server_url: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            probe,
            server_url: server_url.into(),
        }
    }

    /// Run one server-variant case.
    pub async fn start_notebook(&self, case: StartNotebookCase) -> Result<()> {
        self.run_scenario(&Scenario::StartNotebook(case))
            .await
            .into_result()
    }

    /// Check the init process of the image.
    pub async fn tini_entrypoint(&self, expectation: InitProcessExpectation) -> Result<()> {
        self.run_scenario(&Scenario::TiniEntrypoint(expectation))
            .await
            .into_result()
    }

    /// Run scenarios one after the other.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> Vec<ScenarioResult> {
        info!(count = scenarios.len(), "Starting container test suite");

        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            results.push(self.run_scenario(scenario).await);
        }

        let passed = results.iter().filter(|r| r.success()).count();
        info!(
            total = results.len(),
            passed = passed,
            failed = results.len() - passed,
            "Container test suite completed"
        );

        results
    }

    /// Run a single scenario and always remove its container.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let start_time = Instant::now();
        let name = scenario.name();
        let mut details = ScenarioDetails::default();
        let mut container_name = None;

        info!(scenario = %name, "Starting test scenario");

        let config = scenario
            .container_config()
            .named(generate_test_container_name(&name));

        let outcome = match self.runner.run(&config).await {
            Ok(mut container) => {
                details.container_started = true;
                container_name = Some(container.name().to_string());

                let checked = self
                    .check_scenario(scenario, container.as_ref(), &mut details)
                    .await;
                let removed = container.remove().await;
                details.container_removed = removed.is_ok();

                settle(checked, removed)
            }
            Err(e) => Err(e),
        };

        let duration = start_time.elapsed();
        match &outcome {
            Ok(()) => info!(
                scenario = %name,
                duration_ms = duration.as_millis() as u64,
                "Test scenario passed"
            ),
            Err(e) => error!(
                scenario = %name,
                kind = e.kind(),
                error = %e,
                "Test scenario failed"
            ),
        }

        ScenarioResult {
            scenario: *scenario,
            container: container_name,
            error: outcome.err(),
            duration,
            details,
        }
    }

    async fn check_scenario(
        &self,
        scenario: &Scenario,
        container: &dyn RunningContainer,
        details: &mut ScenarioDetails,
    ) -> Result<()> {
        match scenario {
            Scenario::StartNotebook(case) => self.check_start_notebook(case, container, details).await,
            Scenario::TiniEntrypoint(expectation) => {
                self.check_init_process(expectation, container, details).await
            }
        }
    }

    async fn check_start_notebook(
        &self,
        case: &StartNotebookCase,
        container: &dyn RunningContainer,
        details: &mut ScenarioDetails,
    ) -> Result<()> {
        info!(
            expected_server = case.expected_server,
            environment = %case.label(),
            "Checking that start-notebook launches the expected server"
        );

        let response = self.probe.get(&self.server_url).await?;
        details.probe_status = Some(response.status_code);

        let logs = container.logs().await?;
        debug!(container_id = container.id(), logs = %logs, "Container logs");

        assert_no_errors(&logs)?;
        assert_warnings(&logs, case.expected_warning)?;
        if response.status_code != 200 {
            return Err(AssertionFailure::new(
                format!(
                    "Server is not listening: expected status 200, got {}",
                    response.status_code
                ),
                logs,
            )
            .into());
        }
        assert_command_launched(&logs, case.expected_server)?;

        details.logs_checked = true;
        Ok(())
    }

    async fn check_init_process(
        &self,
        expectation: &InitProcessExpectation,
        container: &dyn RunningContainer,
        details: &mut ScenarioDetails,
    ) -> Result<()> {
        info!(
            pid = expectation.pid,
            command = expectation.command,
            "Checking the init process of the container"
        );

        let result = container.exec(&expectation.query()).await?;
        let output = result.trimmed_text();
        debug!(
            container_id = container.id(),
            exit_status = result.exit_status,
            output = %output,
            "Process query output"
        );

        assert_clean_output(&output)?;
        if output != expectation.command {
            return Err(AssertionFailure::new(
                format!(
                    "{} shall be launched as pid {}, got {}",
                    expectation.command, expectation.pid, output
                ),
                output,
            )
            .into());
        }

        details.logs_checked = true;
        Ok(())
    }
}

/// Merge the scenario outcome with the teardown outcome.
///
/// A scenario failure always wins; a teardown failure only surfaces when the
/// scenario itself passed.
fn settle(outcome: Result<()>, teardown: Result<()>) -> Result<()> {
    match (outcome, teardown) {
        (Ok(()), teardown) => teardown,
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(teardown_error)) => {
            warn!(error = %teardown_error, "Container teardown also failed");
            Err(e)
        }
    }
}

#[cfg(test)]
#[path = "scenarios_tests.rs"]
mod tests;
