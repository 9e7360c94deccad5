//! Test utilities shared by the container harness and the cleanup tooling.
//!
//! This crate owns the naming convention for test containers so that the
//! harness (which creates them) and the cleanup binaries (which hunt for
//! leftovers) always agree on what a test container looks like.

use chrono::Utc;
use std::env;
use uuid::Uuid;

/// Prefix carried by every container the harness creates.
pub const TEST_CONTAINER_PREFIX: &str = "test-docker-stacks-";

/// Label attached to every container the harness creates.
pub const TEST_CONTAINER_LABEL: &str = "org.jupyter.docker-stacks.test";

/// Extract workflow context from the CI environment for container naming.
///
/// Returns:
/// - `pr{number}` for pull request workflows (e.g., "pr123")
/// - `main` for pushes to main/master branch
/// - the sanitized branch name for other branch pushes
/// - `local` for local development
///
/// Uses the GITHUB_REF environment variable which contains:
/// - `refs/pull/{number}/merge` for pull requests
/// - `refs/heads/{branch}` for branch pushes
pub fn get_workflow_context() -> String {
    if let Ok(github_ref) = env::var("GITHUB_REF") {
        if let Some(rest) = github_ref.strip_prefix("refs/pull/") {
            if let Some(pr_num) = rest.split('/').next().filter(|n| !n.is_empty()) {
                return format!("pr{}", pr_num);
            }
        } else if let Some(branch) = github_ref.strip_prefix("refs/heads/") {
            if branch == "main" || branch == "master" {
                return "main".to_string();
            }
            return sanitize(branch);
        }
    }

    "local".to_string()
}

/// Generate a unique test container name following the naming convention.
///
/// Format: `test-docker-stacks-{context}-{timestamp}-{scenario}-{random}`
///
/// Docker only accepts `[a-zA-Z0-9][a-zA-Z0-9_.-]` in container names, so the
/// scenario part is sanitized before use.
///
/// # Examples
///
/// ```
/// use test_utils::generate_test_container_name;
///
/// let name = generate_test_container_name("start-notebook");
/// assert!(name.starts_with("test-docker-stacks-"));
/// assert!(name.contains("-start-notebook-"));
/// ```
pub fn generate_test_container_name(scenario: &str) -> String {
    let context = get_workflow_context();
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    let random_suffix = Uuid::new_v4().simple().to_string()[..6].to_lowercase();
    format!(
        "{}{}-{}-{}-{}",
        TEST_CONTAINER_PREFIX,
        context,
        timestamp,
        sanitize(scenario),
        random_suffix
    )
}

/// Check if a container name matches the test container naming pattern.
///
/// Docker reports names with a leading `/`, which is ignored here.
pub fn is_test_container(name: &str) -> bool {
    name.trim_start_matches('/').starts_with(TEST_CONTAINER_PREFIX)
}

fn sanitize(value: &str) -> String {
    let mapped: String = value
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();

    mapped
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
