//! Subprocess execution with a hard timeout
//!
//! Detection spawns at most two kinds of processes: the platform
//! `which`/`where` lookup and `<exe> --version`. Both go through
//! [`CommandRunner`] so callers can substitute a fake in tests.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SetupError};

/// Captured output of a finished process
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// First non-empty line across stdout then stderr
    pub fn first_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .map(str::trim)
            .find(|line| !line.is_empty())
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program args..` to completion, killing it after `timeout`.
    ///
    /// `path_env` replaces the child's PATH when given.
    async fn run(
        &self,
        program: &Path,
        args: &[&str],
        path_env: Option<&str>,
        timeout: Duration,
    ) -> Result<CommandOutput>;
}

/// Runs real processes on the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[&str],
        path_env: Option<&str>,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        debug!("Running: {} {}", program.display(), args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = path_env {
            cmd.env("PATH", path);
        }

        let child = cmd.spawn().map_err(|e| {
            SetupError::CommandFailed(format!("Failed to spawn {}: {}", program.display(), e))
        })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(SetupError::CommandTimeout(timeout)),
        };

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line_prefers_stdout() {
        let out = CommandOutput {
            success: true,
            stdout: "\n  arm-none-eabi-gcc 12.2.1\nmore".to_string(),
            stderr: "ignored".to_string(),
        };
        assert_eq!(out.first_line(), Some("arm-none-eabi-gcc 12.2.1"));
    }

    #[test]
    fn test_first_line_falls_back_to_stderr() {
        let out = CommandOutput {
            success: true,
            stdout: String::new(),
            stderr: "Open On-Chip Debugger 0.12.0\n".to_string(),
        };
        assert_eq!(out.first_line(), Some("Open On-Chip Debugger 0.12.0"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_runs_process() {
        let runner = TokioCommandRunner;
        let out = runner
            .run(Path::new("/bin/sh"), &["-c", "echo hello"], None, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.first_line(), Some("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_times_out() {
        let runner = TokioCommandRunner;
        let result = runner
            .run(Path::new("/bin/sh"), &["-c", "sleep 5"], None, Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(SetupError::CommandTimeout(_))));
    }

    #[tokio::test]
    async fn test_tokio_runner_missing_program() {
        let runner = TokioCommandRunner;
        let result = runner
            .run(Path::new("/nonexistent/program_xyz"), &[], None, Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(SetupError::CommandFailed(_))));
    }
}
