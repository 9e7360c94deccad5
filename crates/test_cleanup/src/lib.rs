//! Test container cleanup utilities.
//!
//! A harness run that is killed (CI timeout, Ctrl-C) never reaches its
//! teardown, leaving containers that keep the notebook port bound. This crate
//! finds such leftovers by their name and removes them. It can be used both
//! programmatically and via the CLI binaries.

use anyhow::{Context, Result};
use bollard::container::{ListContainersOptions, RemoveContainerOptions};
use bollard::service::ContainerSummary;
use bollard::Docker;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

pub use test_utils::{is_test_container, TEST_CONTAINER_PREFIX};

/// A test container selected for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedContainer {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Select test containers created before `cutoff`.
///
/// Containers without a creation time are skipped.
pub fn select_orphans(
    containers: &[ContainerSummary],
    cutoff: DateTime<Utc>,
) -> Vec<OrphanedContainer> {
    select_test_containers(containers, |_, created_at| created_at < cutoff)
}

/// Select test containers created by one workflow context (e.g. `pr123`),
/// whatever their age.
pub fn select_context_containers(
    containers: &[ContainerSummary],
    context: &str,
) -> Vec<OrphanedContainer> {
    let prefix = format!("{}{}-", TEST_CONTAINER_PREFIX, context);
    select_test_containers(containers, |name, _| name.starts_with(&prefix))
}

fn select_test_containers<F>(containers: &[ContainerSummary], keep: F) -> Vec<OrphanedContainer>
where
    F: Fn(&str, DateTime<Utc>) -> bool,
{
    containers
        .iter()
        .filter_map(|summary| {
            let id = summary.id.clone()?;
            let name = summary
                .names
                .as_ref()?
                .iter()
                .map(|name| name.trim_start_matches('/'))
                .find(|name| is_test_container(name))?
                .to_string();
            let created_at = DateTime::from_timestamp(summary.created?, 0)?;

            keep(&name, created_at).then_some(OrphanedContainer {
                id,
                name,
                created_at,
            })
        })
        .collect()
}

/// Creation time before which a test container counts as orphaned.
pub fn orphan_cutoff(now: DateTime<Utc>, max_age_hours: u64) -> Result<DateTime<Utc>> {
    i64::try_from(max_age_hours)
        .ok()
        .and_then(chrono::Duration::try_hours)
        .and_then(|max_age| now.checked_sub_signed(max_age))
        .with_context(|| format!("Maximum age of {} hours is out of range", max_age_hours))
}

/// Container cleanup operations for test containers.
pub struct ContainerCleanup {
    docker: Docker,
}

impl ContainerCleanup {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connect to the local Docker daemon.
    pub fn connect() -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().context("Failed to connect to Docker daemon")?;
        Ok(Self::new(docker))
    }

    async fn list_all_containers(&self) -> Result<Vec<ContainerSummary>> {
        self.docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
            .context("Failed to list containers")
    }

    /// Find and remove test containers older than `max_age_hours`.
    ///
    /// Returns the names of the containers that were removed. A container
    /// that cannot be removed is logged and skipped.
    pub async fn cleanup_orphaned_containers(&self, max_age_hours: u64) -> Result<Vec<String>> {
        let cutoff = orphan_cutoff(Utc::now(), max_age_hours)?;
        info!(
            max_age_hours = max_age_hours,
            cutoff = %cutoff,
            "Searching for orphaned test containers"
        );

        let containers = self.list_all_containers().await?;
        let orphans = select_orphans(&containers, cutoff);
        Ok(self.remove_all(orphans).await)
    }

    /// Remove every test container created by a workflow context, e.g. all
    /// containers of a closed pull request.
    pub async fn cleanup_context_containers(&self, context: &str) -> Result<Vec<String>> {
        info!(context = context, "Searching for test containers of workflow context");

        let containers = self.list_all_containers().await?;
        let selected = select_context_containers(&containers, context);
        Ok(self.remove_all(selected).await)
    }

    async fn remove_all(&self, containers: Vec<OrphanedContainer>) -> Vec<String> {
        let mut removed = Vec::new();

        for container in containers {
            debug!(
                name = %container.name,
                created_at = %container.created_at,
                "Removing test container"
            );

            match self.remove_container(&container.id).await {
                Ok(()) => {
                    info!(name = %container.name, "✓ Removed test container");
                    removed.push(container.name);
                }
                Err(e) => {
                    warn!(name = %container.name, error = %e, "Failed to remove test container");
                }
            }
        }

        info!(count = removed.len(), "Test container cleanup finished");
        removed
    }

    /// Force-remove a single container.
    pub async fn remove_container(&self, id: &str) -> Result<()> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .with_context(|| format!("Failed to remove container {}", id))
    }
}

/// Initialize logging for the cleanup binaries.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
