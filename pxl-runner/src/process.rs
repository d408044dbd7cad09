//! External process execution
//!
//! Collaborators shell out to `uv`, `docker` and `podman`. A non-zero exit
//! status becomes a `CollaboratorError` carrying the status and the tail of
//! stderr.

use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::service::{CollaboratorError, CollaboratorResult};

/// Lines of stderr kept in an error message
const STDERR_TAIL: usize = 20;

/// Runs a command to completion, capturing its output
///
/// Returns stdout on success.
pub async fn run_captured(command: &mut Command, what: &str) -> CollaboratorResult<String> {
    debug!("Running {}: {:?}", what, command.as_std());

    let output = command
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| CollaboratorError::new(format!("failed to start {}: {}", what, e)))?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(CollaboratorError::with_exit_code(
        format!("{} failed{}", what, stderr_tail(&stderr)),
        output.status.code(),
    ))
}

/// Runs a command with inherited stdout/stderr
///
/// Used for pipeline runs whose output the user should watch live.
pub async fn run_streaming(command: &mut Command, what: &str) -> CollaboratorResult<()> {
    debug!("Running {}: {:?}", what, command.as_std());

    let status = command
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|e| CollaboratorError::new(format!("failed to start {}: {}", what, e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(CollaboratorError::with_exit_code(
            format!("{} failed", what),
            status.code(),
        ))
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    if lines.is_empty() {
        return String::new();
    }
    let start = lines.len().saturating_sub(STDERR_TAIL);
    format!(":\n{}", lines[start..].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captured_success() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello"]);
        let out = run_captured(&mut cmd, "echo").await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_captured_failure_keeps_status_and_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo broken >&2; exit 3"]);
        let err = run_captured(&mut cmd, "build").await.unwrap_err();
        assert_eq!(err.exit_code, Some(3));
        assert!(err.message.starts_with("build failed"));
        assert!(err.message.contains("broken"));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let mut cmd = Command::new("definitely-not-a-real-binary-pxl");
        let err = run_streaming(&mut cmd, "tool").await.unwrap_err();
        assert!(err.message.contains("failed to start tool"));
        assert_eq!(err.exit_code, None);
    }

    #[test]
    fn test_stderr_tail_is_bounded() {
        let long: String = (0..50).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(&long);
        assert!(tail.contains("line 49"));
        assert!(!tail.contains("line 29\n"));
        assert_eq!(stderr_tail("  \n"), "");
    }
}
