//! Markdown report of a test run, for CI artifacts.

use std::fmt::{self, Write};
use std::io;
use std::path::Path;

use crate::errors::Result;
use crate::scenarios::ScenarioResult;

fn mark(value: bool) -> &'static str {
    if value { "✅" } else { "❌" }
}

/// Render the results of a run as a markdown document.
pub fn render_report(
    image: &str,
    results: &[ScenarioResult],
) -> std::result::Result<String, fmt::Error> {
    let mut report = String::new();
    let passed = results.iter().filter(|r| r.success()).count();
    let total_duration: f64 = results.iter().map(|r| r.duration.as_secs_f64()).sum();

    writeln!(report, "# docker-stacks Container Test Report")?;
    writeln!(report)?;
    writeln!(
        report,
        "Generated: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(report, "Image: `{}`", image)?;
    writeln!(report)?;

    writeln!(report, "## Summary")?;
    writeln!(report)?;
    writeln!(report, "| Metric | Value |")?;
    writeln!(report, "|--------|-------|")?;
    writeln!(report, "| Total Scenarios | {} |", results.len())?;
    writeln!(report, "| Passed | {} |", passed)?;
    writeln!(report, "| Failed | {} |", results.len() - passed)?;
    writeln!(report, "| Total Duration | {:.2}s |", total_duration)?;
    writeln!(report)?;

    writeln!(report, "## Scenario Results")?;
    writeln!(report)?;

    for result in results {
        writeln!(
            report,
            "### {} {}",
            mark(result.success()),
            result.scenario.name()
        )?;
        writeln!(report)?;
        writeln!(
            report,
            "- **Status**: {}",
            if result.success() { "PASSED" } else { "FAILED" }
        )?;
        writeln!(
            report,
            "- **Duration**: {:.2}s",
            result.duration.as_secs_f64()
        )?;
        if let Some(container) = &result.container {
            writeln!(report, "- **Container**: {}", container)?;
        }
        writeln!(
            report,
            "- **Container Started**: {}",
            mark(result.details.container_started)
        )?;
        if let Some(status) = result.details.probe_status {
            writeln!(report, "- **HTTP Status**: {}", status)?;
        }
        writeln!(
            report,
            "- **Output Checked**: {}",
            mark(result.details.logs_checked)
        )?;
        writeln!(
            report,
            "- **Container Removed**: {}",
            mark(result.details.container_removed)
        )?;

        if let Some(error) = &result.error {
            writeln!(report, "- **Error** ({}):", error.kind())?;
            writeln!(report)?;
            writeln!(report, "```text")?;
            writeln!(report, "{}", error)?;
            writeln!(report, "```")?;
        }
        writeln!(report)?;
    }

    Ok(report)
}

/// Render the report and write it to `path`.
pub fn write_report(path: &Path, image: &str, results: &[ScenarioResult]) -> Result<()> {
    let report = render_report(image, results).map_err(io::Error::other)?;
    std::fs::write(path, report)?;
    Ok(())
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
