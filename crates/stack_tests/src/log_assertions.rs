//! Assertions over captured container output.
//!
//! The entrypoint scripts of the images report problems with lines prefixed
//! by `ERROR` or `WARNING` and announce the server they launch with
//! `Executing the command: jupyter <variant>`. These checks turn that contract
//! into pass/fail results, each failure carrying the full captured text.

use crate::errors::AssertionFailure;

/// Marker of an error reported by the entrypoint scripts.
pub const ERROR_MARKER: &str = "ERROR";

/// Marker of a warning reported by the entrypoint scripts.
pub const WARNING_MARKER: &str = "WARNING";

/// Prefix of the only warning the images are allowed to print.
pub const DEPRECATION_NOTICE: &str = "WARNING: Jupyter Notebook deprecation notice";

type AssertionResult = std::result::Result<(), AssertionFailure>;

/// Fail if `ERROR` appears anywhere in the logs.
pub fn assert_no_errors(logs: &str) -> AssertionResult {
    if logs.contains(ERROR_MARKER) {
        return Err(AssertionFailure::new(
            format!("'{}' found in container logs", ERROR_MARKER),
            logs,
        ));
    }
    Ok(())
}

/// Check warnings against the expectation of the scenario.
///
/// Without an expected warning, `WARNING` must not appear anywhere. With one,
/// exactly one line may start with `WARNING` and it must be the deprecation
/// notice.
pub fn assert_warnings(logs: &str, expected: bool) -> AssertionResult {
    if !expected {
        if logs.contains(WARNING_MARKER) {
            return Err(AssertionFailure::new(
                format!("unexpected '{}' found in container logs", WARNING_MARKER),
                logs,
            ));
        }
        return Ok(());
    }

    let warnings = warning_lines(logs);
    match warnings.as_slice() {
        [warning] if warning.starts_with(DEPRECATION_NOTICE) => Ok(()),
        [warning] => Err(AssertionFailure::new(
            format!(
                "expected the warning to start with '{}', got '{}'",
                DEPRECATION_NOTICE,
                warning.trim_end()
            ),
            logs,
        )),
        _ => Err(AssertionFailure::new(
            format!(
                "expected exactly one line starting with '{}', found {}",
                WARNING_MARKER,
                warnings.len()
            ),
            logs,
        )),
    }
}

/// Fail unless the logs announce `jupyter <variant>` being launched.
pub fn assert_command_launched(logs: &str, variant: &str) -> AssertionResult {
    let expected = launch_line(variant);
    if !logs.contains(&expected) {
        return Err(AssertionFailure::new(
            format!(
                "not the expected command (jupyter {}) was launched: '{}' missing",
                variant, expected
            ),
            logs,
        ));
    }
    Ok(())
}

/// Fail if either marker appears in command output.
pub fn assert_clean_output(output: &str) -> AssertionResult {
    for marker in [ERROR_MARKER, WARNING_MARKER] {
        if output.contains(marker) {
            return Err(AssertionFailure::new(
                format!("'{}' found in command output", marker),
                output,
            ));
        }
    }
    Ok(())
}

/// Line printed by the entrypoint before it hands over to the server.
pub fn launch_line(variant: &str) -> String {
    format!("Executing the command: jupyter {}", variant)
}

/// Lines starting with the warning marker, in order.
pub fn warning_lines(logs: &str) -> Vec<&str> {
    logs.split('\n')
        .filter(|line| line.starts_with(WARNING_MARKER))
        .collect()
}

#[cfg(test)]
#[path = "log_assertions_tests.rs"]
mod tests;
