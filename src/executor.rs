//! Subprocess execution seam.
//!
//! External command-line collaborators are always reached through
//! [`ProcessRunner`] so tests can substitute a scripted runner and never spawn
//! real processes.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

/// Trait for running system processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `program` once and waits for it to exit.
    ///
    /// Stdout is captured; stderr goes straight to the caller's stderr.
    async fn run(&self, program: &str, args: &[String]) -> Result<Output>;

    /// Checks if a program exists in PATH.
    fn program_exists(&self, program: &str) -> bool;
}

/// Default process runner backed by `tokio::process`.
///
/// Children are killed if the waiting future is dropped, so an interrupted
/// invocation never leaves a process behind.
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<Output> {
        debug!("Spawning {} with {} argument(s)", program, args.len());
        // `output()` would pipe stderr too; spawn keeps it on the terminal.
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to run {}", program))?;
        child
            .wait_with_output()
            .await
            .with_context(|| format!("failed to wait for {}", program))
    }

    fn program_exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_system_runner_captures_stdout_and_status() {
        let output = SystemProcessRunner
            .run("sh", &["-c".to_string(), "echo alice; exit 3".to_string()])
            .await
            .unwrap();

        assert_eq!(String::from_utf8_lossy(&output.stdout), "alice\n");
        assert_eq!(output.status.code(), Some(3));
    }

    #[tokio::test]
    async fn test_system_runner_leaves_stderr_uncaptured() {
        let output = SystemProcessRunner
            .run("sh", &["-c".to_string(), "echo visible >&2; echo kept".to_string()])
            .await
            .unwrap();

        assert_eq!(String::from_utf8_lossy(&output.stdout), "kept\n");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_system_runner_missing_program_is_an_error() {
        let err = SystemProcessRunner
            .run("adminkit-no-such-program", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to run adminkit-no-such-program"));
    }

    #[test]
    fn test_program_exists() {
        assert!(SystemProcessRunner.program_exists("sh"));
        assert!(!SystemProcessRunner.program_exists("adminkit-no-such-program"));
    }
}
