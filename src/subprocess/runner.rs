use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ProcessError;

#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub stdin: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

// A timeout never produces an ExitStatus; it surfaces as
// ProcessError::Timeout before any output exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            _ => None,
        }
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

/// Production runner backed by `tokio::process`.
///
/// Spawns the command, waits for completion, and captures stdout/stderr as
/// lossily-decoded UTF-8 text. A failure to start the process at all maps to
/// [`ProcessError::CommandNotFound`] or [`ProcessError::SpawnFailed`], which is a
/// distinct condition from the spawned tool reporting its own failure through
/// exit status or stderr.
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    fn configure_command(command: &ProcessCommand) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args);

        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        if command.stdin.is_some() {
            cmd.stdin(std::process::Stdio::piped());
        }
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        cmd
    }

    async fn write_stdin(
        child: &mut tokio::process::Child,
        stdin_data: &str,
    ) -> Result<(), ProcessError> {
        if let Some(mut stdin) = child.stdin.take() {
            use tokio::io::AsyncWriteExt;
            stdin
                .write_all(stdin_data.as_bytes())
                .await
                .map_err(ProcessError::Io)?;
            stdin.shutdown().await.map_err(ProcessError::Io)?;
        }
        Ok(())
    }

    async fn wait_with_timeout(
        child: tokio::process::Child,
        timeout: Option<Duration>,
    ) -> Result<std::process::Output, ProcessError> {
        match timeout {
            Some(duration) => {
                match tokio::time::timeout(duration, child.wait_with_output()).await {
                    Ok(result) => result.map_err(ProcessError::Io),
                    Err(_) => Err(ProcessError::Timeout(duration)),
                }
            }
            None => child.wait_with_output().await.map_err(ProcessError::Io),
        }
    }

    fn parse_exit_status(status: std::process::ExitStatus) -> ExitStatus {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            Self::parse_signal_status(status)
        }
    }

    #[cfg(unix)]
    fn parse_signal_status(status: std::process::ExitStatus) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            ExitStatus::Signal(signal)
        } else {
            ExitStatus::Error(1)
        }
    }

    #[cfg(not(unix))]
    fn parse_signal_status(_status: std::process::ExitStatus) -> ExitStatus {
        ExitStatus::Error(1)
    }

    fn build_output(
        output: std::process::Output,
        status: ExitStatus,
        duration: Duration,
    ) -> ProcessOutput {
        ProcessOutput {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration,
        }
    }

    fn log_result(result: &ProcessOutput, command: &ProcessCommand) {
        let command_str = format!("{} {}", command.program, command.args.join(" "));

        match &result.status {
            ExitStatus::Success => {
                tracing::debug!(
                    "Subprocess completed successfully in {:?}: {}",
                    result.duration,
                    command_str
                );
            }
            ExitStatus::Error(code) => {
                tracing::debug!(
                    "Subprocess failed with exit code {} in {:?}: {}",
                    code,
                    result.duration,
                    command_str
                );
                if !result.stderr.is_empty() {
                    tracing::trace!("Stderr: {}", result.stderr);
                }
            }
            ExitStatus::Signal(signal) => {
                tracing::warn!(
                    "Subprocess terminated by signal {} in {:?}: {}",
                    signal,
                    result.duration,
                    command_str
                );
            }
        }
    }

    fn map_spawn_error(error: std::io::Error, program: &str) -> ProcessError {
        if error.kind() == std::io::ErrorKind::NotFound {
            ProcessError::CommandNotFound(program.to_string())
        } else {
            ProcessError::SpawnFailed {
                command: program.to_string(),
                source: error,
            }
        }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let start = std::time::Instant::now();

        tracing::debug!(
            "Executing subprocess: {} {}",
            command.program,
            command.args.join(" ")
        );
        if let Some(ref dir) = command.working_dir {
            tracing::trace!("Working directory: {:?}", dir);
        }

        let mut cmd = Self::configure_command(&command);
        let mut child = cmd
            .spawn()
            .map_err(|e| Self::map_spawn_error(e, &command.program))?;

        if let Some(stdin_data) = &command.stdin {
            Self::write_stdin(&mut child, stdin_data).await?;
        }

        let output = Self::wait_with_timeout(child, command.timeout).await?;

        let duration = start.elapsed();
        let status = Self::parse_exit_status(output.status);
        let result = Self::build_output(output, status, duration);

        Self::log_result(&result, &command);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subprocess::ProcessCommandBuilder;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let command = ProcessCommandBuilder::new("sh")
            .args(["-c", "echo hello"])
            .build();

        let output = TokioProcessRunner.run(command).await.unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "hello");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_run_captures_stderr_and_exit_code() {
        let command = ProcessCommandBuilder::new("sh")
            .args(["-c", "echo oops >&2; exit 3"])
            .build();

        let output = TokioProcessRunner.run(command).await.unwrap();
        assert_eq!(output.status, ExitStatus::Error(3));
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_run_with_stdin() {
        let command = ProcessCommandBuilder::new("sh")
            .args(["-c", "cat"])
            .stdin("piped input".to_string())
            .build();

        let output = TokioProcessRunner.run(command).await.unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, "piped input");
    }

    #[tokio::test]
    async fn test_run_with_working_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let command = ProcessCommandBuilder::new("pwd")
            .current_dir(temp_dir.path())
            .build();

        let output = TokioProcessRunner.run(command).await.unwrap();
        assert!(output.status.success());
        let reported = std::path::PathBuf::from(output.stdout.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            temp_dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_run_missing_executable_is_spawn_failure() {
        let command = ProcessCommandBuilder::new("definitely_not_a_real_command_42").build();

        let result = TokioProcessRunner.run(command).await;
        match result.unwrap_err() {
            ProcessError::CommandNotFound(program) => {
                assert_eq!(program, "definitely_not_a_real_command_42");
            }
            other => panic!("Expected CommandNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let command = ProcessCommandBuilder::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(50))
            .build();

        let result = TokioProcessRunner.run(command).await;
        match result.unwrap_err() {
            ProcessError::Timeout(duration) => {
                assert_eq!(duration, Duration::from_millis(50));
            }
            other => panic!("Expected Timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_exit_status_code() {
        assert_eq!(ExitStatus::Success.code(), Some(0));
        assert_eq!(ExitStatus::Error(128).code(), Some(128));
        assert_eq!(ExitStatus::Signal(9).code(), None);
    }
}
