//! Tests for scenario flow using fake collaborators.

use super::*;
use crate::container::ExecResult;
use crate::probe::{HttpProbe, ProbeResponse};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct FakeState {
    started: Vec<ContainerConfig>,
    live: usize,
    max_live: usize,
    removed: usize,
    execs: Vec<String>,
}

/// Runner whose containers print canned logs and exec output.
#[derive(Clone)]
struct FakeRunner {
    state: Arc<Mutex<FakeState>>,
    logs: String,
    exec_output: Vec<u8>,
    fail_start: bool,
    fail_remove: bool,
}

impl FakeRunner {
    fn with_logs(logs: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState::default())),
            logs: logs.into(),
            exec_output: b"tini\n".to_vec(),
            fail_start: false,
            fail_remove: false,
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl ContainerRunner for FakeRunner {
    async fn run(&self, config: &ContainerConfig) -> Result<Box<dyn RunningContainer>> {
        if self.fail_start {
            return Err(HarnessError::ContainerStart {
                image: "jupyter/base-notebook".to_string(),
                reason: "No such image".to_string(),
            });
        }

        let mut state = self.state();
        state.started.push(config.clone());
        state.live += 1;
        state.max_live = state.max_live.max(state.live);

        Ok(Box::new(FakeContainer {
            runner: self.clone(),
            name: config.name.clone().unwrap_or_default(),
            removed: false,
        }))
    }
}

struct FakeContainer {
    runner: FakeRunner,
    name: String,
    removed: bool,
}

#[async_trait]
impl RunningContainer for FakeContainer {
    fn id(&self) -> &str {
        "0123456789ab"
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn logs(&self) -> Result<String> {
        Ok(self.runner.logs.clone())
    }

    async fn exec(&self, command: &str) -> Result<ExecResult> {
        self.runner.state().execs.push(command.to_string());
        Ok(ExecResult {
            exit_status: 0,
            output: self.runner.exec_output.clone(),
        })
    }

    async fn remove(&mut self) -> Result<()> {
        if self.removed {
            return Ok(());
        }
        if self.runner.fail_remove {
            return Err(HarnessError::Teardown {
                container_id: self.id().to_string(),
                reason: "daemon went away".to_string(),
            });
        }
        self.removed = true;
        let mut state = self.runner.state();
        state.live -= 1;
        state.removed += 1;
        Ok(())
    }
}

/// Probe answering with a fixed status, or timing out when there is none.
struct FakeProbe {
    status: Option<u16>,
    requested: Mutex<Vec<String>>,
}

impl FakeProbe {
    fn answering(status: u16) -> Self {
        Self {
            status: Some(status),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn silent() -> Self {
        Self {
            status: None,
            requested: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl HttpProbe for FakeProbe {
    async fn get(&self, url: &str) -> Result<ProbeResponse> {
        self.requested.lock().unwrap().push(url.to_string());
        match self.status {
            Some(status_code) => Ok(ProbeResponse {
                status_code,
                body: String::new(),
            }),
            None => Err(HarnessError::ProbeTimeout {
                url: url.to_string(),
                timeout: Duration::from_secs(1),
            }),
        }
    }
}

fn logs_for(case: &StartNotebookCase) -> String {
    let mut logs = String::new();
    if case.expected_warning {
        logs.push_str("WARNING: Jupyter Notebook deprecation notice https://github.com/jupyter/docker-stacks.\r\n");
    }
    logs.push_str(&format!(
        "Entered start.sh with args: jupyter {}\r\n",
        case.expected_server
    ));
    logs.push_str(&format!(
        "Executing the command: jupyter {}\r\n",
        case.expected_server
    ));
    logs.push_str("[I ServerApp] Jupyter Server is running at: http://127.0.0.1:8888/\r\n");
    logs
}

const URL: &str = "http://localhost:8888";

#[tokio::test]
async fn test_every_start_notebook_case_passes_with_matching_logs() {
    for case in START_NOTEBOOK_CASES {
        let runner = FakeRunner::with_logs(logs_for(&case));
        let probe = FakeProbe::answering(200);
        let scenarios = ScenarioRunner::new(&runner, &probe, URL);

        let result = scenarios.run_scenario(&Scenario::StartNotebook(case)).await;

        assert!(result.success(), "{}: {:?}", case.label(), result.error);
        assert!(result.details.container_started);
        assert_eq!(result.details.probe_status, Some(200));
        assert!(result.details.logs_checked);
        assert!(result.details.container_removed);
        assert_eq!(runner.state().removed, 1);
        assert_eq!(probe.requested.lock().unwrap().as_slice(), [URL.to_string()]);
    }
}

#[tokio::test]
async fn test_start_notebook_passes_container_configuration() {
    let case = START_NOTEBOOK_CASES[0];
    let runner = FakeRunner::with_logs(logs_for(&case));
    let probe = FakeProbe::answering(200);
    let scenarios = ScenarioRunner::new(&runner, &probe, URL);

    scenarios.start_notebook(case).await.unwrap();

    let state = runner.state();
    let config = &state.started[0];
    assert_eq!(config.command, vec!["start-notebook.sh".to_string()]);
    assert_eq!(config.environment, vec!["JUPYTER_ENABLE_LAB=yes".to_string()]);
    assert!(config.interactive);
    assert!(
        config
            .name
            .as_deref()
            .is_some_and(|name| name.starts_with("test-docker-stacks-"))
    );
}

#[tokio::test]
async fn test_start_notebook_fails_on_error_and_still_removes_container() {
    let case = START_NOTEBOOK_CASES[1];
    let logs = format!("{}ERROR: could not write config\n", logs_for(&case));
    let runner = FakeRunner::with_logs(logs);
    let probe = FakeProbe::answering(200);
    let scenarios = ScenarioRunner::new(&runner, &probe, URL);

    let result = scenarios.run_scenario(&Scenario::StartNotebook(case)).await;

    assert!(!result.success());
    assert_eq!(result.error.as_ref().map(HarnessError::kind), Some("assertion"));
    assert!(!result.details.logs_checked);
    assert!(result.details.container_removed);
    assert_eq!(runner.state().live, 0);
}

#[tokio::test]
async fn test_start_notebook_fails_on_unexpected_warning() {
    // Logs of the deprecated case fed to a case that expects no warning.
    let runner = FakeRunner::with_logs(logs_for(&START_NOTEBOOK_CASES[0]));
    let probe = FakeProbe::answering(200);
    let scenarios = ScenarioRunner::new(&runner, &probe, URL);

    let err = scenarios
        .start_notebook(START_NOTEBOOK_CASES[2])
        .await
        .unwrap_err();

    match err {
        HarnessError::Assertion(failure) => assert!(failure.message.contains("WARNING")),
        other => panic!("expected an assertion failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_start_notebook_fails_on_wrong_variant() {
    let runner = FakeRunner::with_logs(logs_for(&START_NOTEBOOK_CASES[3]));
    let probe = FakeProbe::answering(200);
    let scenarios = ScenarioRunner::new(&runner, &probe, URL);

    let err = scenarios
        .start_notebook(START_NOTEBOOK_CASES[5])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("jupyter nbclassic"));
    assert_eq!(runner.state().removed, 1);
}

#[tokio::test]
async fn test_start_notebook_fails_on_non_200_status() {
    let case = START_NOTEBOOK_CASES[2];
    let runner = FakeRunner::with_logs(logs_for(&case));
    let probe = FakeProbe::answering(500);
    let scenarios = ScenarioRunner::new(&runner, &probe, URL);

    let result = scenarios.run_scenario(&Scenario::StartNotebook(case)).await;

    assert_eq!(result.details.probe_status, Some(500));
    let message = result.error.unwrap().to_string();
    assert!(message.contains("Server is not listening"));
    // The captured logs travel with the failure.
    assert!(message.contains("Executing the command: jupyter lab"));
}

#[tokio::test]
async fn test_start_notebook_probe_timeout_removes_container() {
    let case = START_NOTEBOOK_CASES[1];
    let runner = FakeRunner::with_logs(logs_for(&case));
    let probe = FakeProbe::silent();
    let scenarios = ScenarioRunner::new(&runner, &probe, URL);

    let result = scenarios.run_scenario(&Scenario::StartNotebook(case)).await;

    assert_eq!(
        result.error.as_ref().map(HarnessError::kind),
        Some("probe_timeout")
    );
    assert!(result.details.probe_status.is_none());
    assert!(result.details.container_removed);
}

#[tokio::test]
async fn test_container_start_failure_is_reported() {
    let mut runner = FakeRunner::with_logs("");
    runner.fail_start = true;
    let probe = FakeProbe::answering(200);
    let scenarios = ScenarioRunner::new(&runner, &probe, URL);

    let result = scenarios
        .run_scenario(&Scenario::TiniEntrypoint(TINI_INIT_PROCESS))
        .await;

    assert_eq!(
        result.error.as_ref().map(HarnessError::kind),
        Some("container_start")
    );
    assert!(!result.details.container_started);
    assert!(result.container.is_none());
    assert!(probe.requested.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_teardown_failure_fails_an_otherwise_passing_scenario() {
    let mut runner = FakeRunner::with_logs("");
    runner.fail_remove = true;
    let probe = FakeProbe::answering(200);
    let scenarios = ScenarioRunner::new(&runner, &probe, URL);

    let result = scenarios
        .run_scenario(&Scenario::TiniEntrypoint(TINI_INIT_PROCESS))
        .await;

    assert!(result.details.logs_checked);
    assert!(!result.details.container_removed);
    assert_eq!(result.error.as_ref().map(HarnessError::kind), Some("teardown"));
}

#[tokio::test]
async fn test_scenario_failure_wins_over_teardown_failure() {
    let mut runner = FakeRunner::with_logs("ERROR: broken\n");
    runner.fail_remove = true;
    let probe = FakeProbe::answering(200);
    let scenarios = ScenarioRunner::new(&runner, &probe, URL);

    let err = scenarios
        .start_notebook(START_NOTEBOOK_CASES[1])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "assertion");
}

#[tokio::test]
async fn test_tini_entrypoint_passes() {
    let runner = FakeRunner::with_logs("");
    let probe = FakeProbe::answering(200);
    let scenarios = ScenarioRunner::new(&runner, &probe, URL);

    scenarios.tini_entrypoint(TINI_INIT_PROCESS).await.unwrap();

    let state = runner.state();
    assert_eq!(state.execs, vec!["ps -p 1 -o comm=".to_string()]);
    assert_eq!(state.started[0].command, vec!["start.sh".to_string()]);
    assert!(state.started[0].environment.is_empty());
    assert_eq!(state.removed, 1);
    // The init-process check never talks to the server.
    assert!(probe.requested.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_tini_entrypoint_rejects_other_init_process() {
    let mut runner = FakeRunner::with_logs("");
    runner.exec_output = b"bash\n".to_vec();
    let probe = FakeProbe::answering(200);
    let scenarios = ScenarioRunner::new(&runner, &probe, URL);

    let err = scenarios
        .tini_entrypoint(TINI_INIT_PROCESS)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("tini shall be launched as pid 1, got bash"));
}

#[tokio::test]
async fn test_tini_entrypoint_rejects_marker_in_output() {
    let mut runner = FakeRunner::with_logs("");
    runner.exec_output = b"WARNING: tini\n".to_vec();
    let probe = FakeProbe::answering(200);
    let scenarios = ScenarioRunner::new(&runner, &probe, URL);

    let err = scenarios
        .tini_entrypoint(TINI_INIT_PROCESS)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("'WARNING' found in command output"));
}

#[tokio::test]
async fn test_run_all_never_overlaps_containers() {
    let runner = FakeRunner::with_logs(logs_for(&START_NOTEBOOK_CASES[1]));
    let probe = FakeProbe::answering(200);
    let scenarios = ScenarioRunner::new(&runner, &probe, URL);

    let results = scenarios.run_all(&Scenario::all()).await;

    assert_eq!(results.len(), 7);
    let state = runner.state();
    assert_eq!(state.started.len(), 7);
    assert_eq!(state.removed, 7);
    assert_eq!(state.max_live, 1);
    assert_eq!(state.live, 0);

    // Container names are unique per scenario.
    let mut names: Vec<_> = state.started.iter().filter_map(|c| c.name.clone()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 7);
}

#[test]
fn test_scenario_names() {
    assert_eq!(
        Scenario::StartNotebook(START_NOTEBOOK_CASES[1]).name(),
        "start-notebook[default]"
    );
    assert_eq!(
        Scenario::StartNotebook(START_NOTEBOOK_CASES[3]).name(),
        "start-notebook[JUPYTER_CMD=notebook]"
    );
    assert_eq!(
        Scenario::TiniEntrypoint(TINI_INIT_PROCESS).name(),
        "tini-entrypoint"
    );
}

#[test]
fn test_scenario_all_lists_cases_then_tini() {
    let all = Scenario::all();
    assert_eq!(all.len(), 7);
    assert_eq!(all.last(), Some(&Scenario::TiniEntrypoint(TINI_INIT_PROCESS)));
}
