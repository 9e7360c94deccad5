//! Docker container management for start-up tests
//!
//! Provides the [`ContainerRunner`] / [`RunningContainer`] seam used by the
//! scenarios and its implementation over the Docker Engine API. A container
//! handed out by a runner is owned by exactly one scenario and is removed when
//! that scenario ends, whatever its outcome.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{HarnessConfig, NOTEBOOK_PORT};
use crate::errors::{HarnessError, Result};
use test_utils::{generate_test_container_name, TEST_CONTAINER_LABEL};

/// How a container should be started.
///
/// Built once per scenario and never mutated after being passed to a runner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerConfig {
    /// `KEY=VALUE` pairs, in order
    pub environment: Vec<String>,
    /// Command and arguments replacing the image's default command
    pub command: Vec<String>,
    /// Allocate a TTY for the container
    pub interactive: bool,
    /// Container name; the runner generates one when absent
    pub name: Option<String>,
    /// Host port published for the notebook port; the runner default applies when absent
    pub host_port: Option<u16>,
}

impl ContainerConfig {
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_environment<I, S>(mut self, environment: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environment = environment.into_iter().map(Into::into).collect();
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn publish(mut self, host_port: u16) -> Self {
        self.host_port = Some(host_port);
        self
    }
}

/// Outcome of a command executed inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_status: i64,
    pub output: Vec<u8>,
}

impl ExecResult {
    /// Output decoded as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Output with trailing line terminators removed.
    pub fn trimmed_text(&self) -> String {
        self.text().trim_end_matches(['\r', '\n']).to_string()
    }
}

/// Starts containers. One call, one container.
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    /// Create and start a container.
    ///
    /// Fails with [`HarnessError::ContainerStart`] when the engine cannot
    /// create or start it.
    async fn run(&self, config: &ContainerConfig) -> Result<Box<dyn RunningContainer>>;
}

/// Handle to a live container.
#[async_trait]
pub trait RunningContainer: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Output accumulated by the container up to now.
    async fn logs(&self) -> Result<String>;

    /// Run a whitespace-separated command inside the container.
    ///
    /// Fails with [`HarnessError::Exec`] when the container is not running.
    async fn exec(&self, command: &str) -> Result<ExecResult>;

    /// Stop and remove the container. Calling it again is a no-op.
    async fn remove(&mut self) -> Result<()>;
}

/// Build the engine-level configuration for a container.
pub fn build_docker_config(
    image: &str,
    config: &ContainerConfig,
    default_host_port: u16,
) -> Config<String> {
    let container_port = format!("{}/tcp", NOTEBOOK_PORT);
    let host_port = config.host_port.unwrap_or(default_host_port);

    let mut port_bindings = HashMap::new();
    port_bindings.insert(
        container_port.clone(),
        Some(vec![bollard::service::PortBinding {
            host_ip: Some("0.0.0.0".to_string()),
            host_port: Some(host_port.to_string()),
        }]),
    );

    let mut exposed_ports = HashMap::new();
    exposed_ports.insert(container_port, HashMap::new());

    let mut labels = HashMap::new();
    labels.insert(TEST_CONTAINER_LABEL.to_string(), "true".to_string());

    let host_config = bollard::service::HostConfig {
        port_bindings: Some(port_bindings),
        ..Default::default()
    };

    Config {
        image: Some(image.to_string()),
        env: if config.environment.is_empty() {
            None
        } else {
            Some(config.environment.clone())
        },
        cmd: if config.command.is_empty() {
            None
        } else {
            Some(config.command.clone())
        },
        tty: Some(config.interactive),
        labels: Some(labels),
        exposed_ports: Some(exposed_ports),
        host_config: Some(host_config),
        ..Default::default()
    }
}

/// Split a command line into an argument vector. No shell is involved.
pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

/// Grace period in whole seconds as the engine expects it, saturating.
pub fn stop_grace_secs(timeout: Duration) -> i64 {
    i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX)
}

/// Runs containers of one image through the local Docker daemon.
pub struct DockerRunner {
    docker: Docker,
    image: String,
    host_port: u16,
    stop_timeout: Duration,
}

impl DockerRunner {
    /// Connect to the Docker daemon using the local defaults (`DOCKER_HOST`
    /// or the platform socket).
    pub fn connect(config: &HarnessConfig) -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().map_err(|e| HarnessError::ContainerStart {
                image: config.image.clone(),
                reason: format!("cannot connect to the Docker daemon: {}", e),
            })?;

        Ok(Self {
            docker,
            image: config.image.clone(),
            host_port: config.host_port,
            stop_timeout: config.stop_timeout,
        })
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    fn start_error(&self, context: &str, error: impl std::fmt::Display) -> HarnessError {
        HarnessError::ContainerStart {
            image: self.image.clone(),
            reason: format!("{}: {}", context, error),
        }
    }
}

#[async_trait]
impl ContainerRunner for DockerRunner {
    async fn run(&self, config: &ContainerConfig) -> Result<Box<dyn RunningContainer>> {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| generate_test_container_name("container"));
        let docker_config = build_docker_config(&self.image, config, self.host_port);

        debug!(
            name = %name,
            image = %self.image,
            command = ?config.command,
            environment = ?config.environment,
            "Creating container"
        );

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.as_str(),
                    ..Default::default()
                }),
                docker_config,
            )
            .await
            .map_err(|e| self.start_error("failed to create container", e))?;

        let mut container = DockerContainer {
            docker: self.docker.clone(),
            id: created.id,
            name,
            stop_timeout: self.stop_timeout,
            removed: false,
        };

        if let Err(e) = self
            .docker
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await
        {
            // A created-but-never-started container must not outlive this call.
            if let Err(cleanup) = container.remove().await {
                warn!(error = %cleanup, "Failed to remove container that did not start");
            }
            return Err(self.start_error("failed to start container", e));
        }

        info!(
            container_id = %container.id,
            name = %container.name,
            image = %self.image,
            "Container started"
        );

        Ok(Box::new(container))
    }
}

/// A container created by [`DockerRunner`].
pub struct DockerContainer {
    docker: Docker,
    id: String,
    name: String,
    stop_timeout: Duration,
    removed: bool,
}

impl DockerContainer {
    async fn is_running(&self) -> Result<bool> {
        let inspected = self
            .docker
            .inspect_container(&self.id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| HarnessError::Exec {
                container_id: self.id.clone(),
                command: "inspect".to_string(),
                reason: e.to_string(),
            })?;

        Ok(inspected
            .state
            .and_then(|state| state.running)
            .unwrap_or(false))
    }
}

#[async_trait]
impl RunningContainer for DockerContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn logs(&self) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let mut stream = self.docker.logs(&self.id, Some(options));
        let mut output = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| HarnessError::Logs {
                container_id: self.id.clone(),
                reason: e.to_string(),
            })?;
            output.extend_from_slice(&chunk.into_bytes());
        }

        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn exec(&self, command: &str) -> Result<ExecResult> {
        let exec_error = |reason: String| HarnessError::Exec {
            container_id: self.id.clone(),
            command: command.to_string(),
            reason,
        };

        let argv = split_command(command);
        if argv.is_empty() {
            return Err(exec_error("empty command".to_string()));
        }

        if self.removed || !self.is_running().await? {
            return Err(exec_error("container is not running".to_string()));
        }

        let exec = self
            .docker
            .create_exec(
                &self.id,
                CreateExecOptions {
                    cmd: Some(argv),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| exec_error(e.to_string()))?;

        let mut output = Vec::new();
        match self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| exec_error(e.to_string()))?
        {
            StartExecResults::Attached {
                output: mut stream,
                ..
            } => {
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| exec_error(e.to_string()))?;
                    output.extend_from_slice(&chunk.into_bytes());
                }
            }
            StartExecResults::Detached => {
                return Err(exec_error("exec started detached".to_string()));
            }
        }

        let inspected = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| exec_error(e.to_string()))?;
        let exit_status = inspected.exit_code.unwrap_or(-1);

        debug!(
            container_id = %self.id,
            command = command,
            exit_status = exit_status,
            "Command executed in container"
        );

        Ok(ExecResult {
            exit_status,
            output,
        })
    }

    async fn remove(&mut self) -> Result<()> {
        if self.removed {
            return Ok(());
        }

        info!(container_id = %self.id, "Removing container");

        let stop = StopContainerOptions {
            t: stop_grace_secs(self.stop_timeout),
        };
        if let Err(e) = self.docker.stop_container(&self.id, Some(stop)).await {
            // Already stopped or never started; the forced removal below still applies.
            debug!(container_id = %self.id, error = %e, "Stop request failed");
        }

        match self
            .docker
            .remove_container(
                &self.id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            Ok(()) => {}
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                debug!(container_id = %self.id, "Container already gone");
            }
            Err(e) => {
                return Err(HarnessError::Teardown {
                    container_id: self.id.clone(),
                    reason: e.to_string(),
                });
            }
        }

        self.removed = true;
        info!(container_id = %self.id, "✓ Container stopped and removed");
        Ok(())
    }
}

impl Drop for DockerContainer {
    fn drop(&mut self) {
        if self.removed {
            return;
        }

        warn!(
            container_id = %self.id,
            "Container dropped without being removed, forcing removal"
        );

        // The caller's runtime may be blocked on this very thread, so removal
        // runs on its own thread with its own runtime and daemon connection.
        let id = self.id.clone();
        let worker = std::thread::spawn(move || -> std::result::Result<(), String> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| e.to_string())?;

            runtime.block_on(async move {
                let docker = Docker::connect_with_local_defaults().map_err(|e| e.to_string())?;
                docker
                    .remove_container(
                        &id,
                        Some(RemoveContainerOptions {
                            force: true,
                            ..Default::default()
                        }),
                    )
                    .await
                    .map_err(|e| e.to_string())
            })
        });

        match worker.join() {
            Ok(Ok(())) => debug!(container_id = %self.id, "Container removed on drop"),
            Ok(Err(e)) => warn!(container_id = %self.id, error = %e, "Failed to remove container on drop"),
            Err(_) => warn!(container_id = %self.id, "Container removal thread panicked"),
        }
    }
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
