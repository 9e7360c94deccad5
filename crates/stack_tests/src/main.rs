//! Container start-up test runner for the docker-stacks images.
//!
//! Runs the start-up scenarios against an image sequentially, one container
//! at a time, and writes a markdown report.
//!
//! ## Usage
//!
//! ```bash
//! # Run all scenarios against the default image
//! cargo run --bin stack-tests
//!
//! # Only the server-variant cases, against another image
//! cargo run --bin stack-tests -- --image jupyter/minimal-notebook --scenario start-notebook
//!
//! # Remove containers left behind by killed runs first
//! cargo run --bin stack-tests -- --cleanup-orphans --max-age-hours 2
//! ```
//!
//! ## Environment Variables
//!
//! - `TEST_IMAGE`: image under test (default `jupyter/base-notebook`)
//! - `TEST_HOST_PORT`: host port for the notebook server (default 8888)
//! - `TEST_PROBE_TIMEOUT_SECS`: HTTP readiness window (default 30)
//! - `TEST_STOP_TIMEOUT_SECS`: teardown grace period (default 5)

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};

use stack_tests::config::parse_port;
use stack_tests::report::write_report;
use stack_tests::{
    init_logging, DockerRunner, HarnessConfig, ReqwestProbe, Scenario, ScenarioRunner,
    TINI_INIT_PROCESS,
};
use test_cleanup::ContainerCleanup;

fn cli() -> Command {
    Command::new("stack-tests")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Start-up tests for the Jupyter docker-stacks images")
        .arg(
            Arg::new("image")
                .long("image")
                .help("Image under test (overrides TEST_IMAGE)")
                .value_name("IMAGE"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .help("Host port mapped to the notebook server (overrides TEST_HOST_PORT)")
                .value_name("PORT"),
        )
        .arg(
            Arg::new("scenario")
                .long("scenario")
                .help("Scenarios to run")
                .value_parser(["start-notebook", "tini", "all"])
                .default_value("all"),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .help("Where to write the markdown report")
                .value_name("PATH")
                .default_value("container-test-report.md"),
        )
        .arg(
            Arg::new("cleanup-orphans")
                .long("cleanup-orphans")
                .help("Remove orphaned test containers before running scenarios")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max-age-hours")
                .long("max-age-hours")
                .help("Minimum age in hours of containers removed by --cleanup-orphans")
                .value_name("HOURS")
                .value_parser(clap::value_parser!(u64))
                .default_value("1"),
        )
}

#[tokio::main]
async fn main() {
    init_logging();

    let matches = cli().get_matches();

    match run(&matches).await {
        Ok(true) => info!("All container scenarios passed"),
        Ok(false) => process::exit(1),
        Err(e) => {
            error!(error = %e, "Container test run failed");
            process::exit(1);
        }
    }
}

/// Select scenarios from the `--scenario` value.
fn select_scenarios(selection: &str) -> Vec<Scenario> {
    match selection {
        "start-notebook" => Scenario::start_notebook_cases(),
        "tini" => vec![Scenario::TiniEntrypoint(TINI_INIT_PROCESS)],
        _ => Scenario::all(),
    }
}

fn load_config(matches: &ArgMatches) -> Result<HarnessConfig> {
    let mut config =
        HarnessConfig::from_env().context("Failed to load harness configuration")?;

    if let Some(image) = matches.get_one::<String>("image") {
        config.image = image.clone();
    }
    if let Some(port) = matches.get_one::<String>("port") {
        config.host_port = parse_port(port)?;
    }

    Ok(config)
}

async fn run(matches: &ArgMatches) -> Result<bool> {
    let config = load_config(matches)?;
    info!(
        image = %config.image,
        host_port = config.host_port,
        probe_timeout_secs = config.probe_timeout.as_secs(),
        "Loaded harness configuration"
    );

    if matches.get_flag("cleanup-orphans") {
        let max_age_hours = matches
            .get_one::<u64>("max-age-hours")
            .copied()
            .unwrap_or(1);

        match ContainerCleanup::connect() {
            Ok(cleanup) => match cleanup.cleanup_orphaned_containers(max_age_hours).await {
                Ok(removed) => info!(count = removed.len(), "Orphaned containers removed"),
                Err(e) => warn!(error = %e, "Failed to clean up orphaned containers"),
            },
            // Cleanup is best effort; the scenarios report engine problems themselves.
            Err(e) => warn!(error = %e, "Skipping orphan cleanup"),
        }
    }

    let runner = DockerRunner::connect(&config)?;
    let probe = ReqwestProbe::new(config.probe_timeout)?;
    let scenarios = ScenarioRunner::new(&runner, &probe, config.server_url());

    let selection = matches
        .get_one::<String>("scenario")
        .map(String::as_str)
        .unwrap_or("all");
    let results = scenarios.run_all(&select_scenarios(selection)).await;

    info!("=== Container Test Results ===");
    for result in &results {
        info!(
            scenario = %result.scenario.name(),
            status = if result.success() { "PASS" } else { "FAIL" },
            duration_ms = result.duration.as_millis() as u64,
            container = result.container.as_deref(),
            "Scenario result"
        );
        if let Some(error) = &result.error {
            error!(scenario = %result.scenario.name(), error = %error, "Scenario failure details");
        }
    }

    let report_path = matches
        .get_one::<String>("report")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("container-test-report.md"));
    write_report(&report_path, &config.image, &results)
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
    info!(path = %report_path.display(), "Test report written");

    Ok(results.iter().all(|r| r.success()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let matches = cli().try_get_matches_from(["stack-tests"]).unwrap();

        assert_eq!(matches.get_one::<String>("scenario").unwrap(), "all");
        assert_eq!(
            matches.get_one::<String>("report").unwrap(),
            "container-test-report.md"
        );
        assert_eq!(*matches.get_one::<u64>("max-age-hours").unwrap(), 1);
        assert!(!matches.get_flag("cleanup-orphans"));
    }

    #[test]
    fn test_cli_rejects_unknown_scenario() {
        let result = cli().try_get_matches_from(["stack-tests", "--scenario", "jupyterhub"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_select_scenarios() {
        assert_eq!(select_scenarios("start-notebook").len(), 6);
        assert_eq!(
            select_scenarios("tini"),
            vec![Scenario::TiniEntrypoint(TINI_INIT_PROCESS)]
        );
        assert_eq!(select_scenarios("all").len(), 7);
    }
}
