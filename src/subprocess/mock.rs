use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner};

/// Test double for [`ProcessRunner`] with per-command expectations.
///
/// Expectations are matched by program name plus an optional argument
/// predicate; the first matching expectation supplies the canned response.
/// Every call is also recorded so tests can assert on exactly which commands
/// were (or were not) invoked.
#[derive(Clone)]
pub struct MockProcessRunner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<ProcessCommand>>>,
}

struct MockExpectation {
    program: String,
    #[allow(clippy::type_complexity)]
    args_matcher: Option<Box<dyn Fn(&[String]) -> bool + Send + Sync>>,
    response: ProcessOutput,
    times_called: usize,
    expected_times: Option<usize>,
}

pub struct MockCommandConfig {
    runner: MockProcessRunner,
    expectation: MockExpectation,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(Vec::new())),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn expect_command(&mut self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                args_matcher: None,
                response: ProcessOutput {
                    status: ExitStatus::Success,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration: Duration::from_millis(10),
                },
                times_called: 0,
                expected_times: None,
            },
        }
    }

    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        let history = self.call_history.lock().unwrap();
        let count = history.iter().filter(|cmd| cmd.program == program).count();
        count == times
    }

    pub fn get_call_history(&self) -> Vec<ProcessCommand> {
        self.call_history.lock().unwrap().clone()
    }

    pub fn reset(&mut self) {
        self.expectations.lock().unwrap().clear();
        self.call_history.lock().unwrap().clear();
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        self.call_history.lock().unwrap().push(command.clone());

        let mut expectations = self.expectations.lock().unwrap();

        for expectation in expectations.iter_mut() {
            if expectation.program != command.program {
                continue;
            }

            if let Some(ref args_matcher) = expectation.args_matcher {
                if !(args_matcher)(&command.args) {
                    continue;
                }
            }

            expectation.times_called += 1;

            if let Some(expected) = expectation.expected_times {
                if expectation.times_called > expected {
                    return Err(ProcessError::MockExpectationNotMet(format!(
                        "Command '{}' called {} times, expected {}",
                        command.program, expectation.times_called, expected
                    )));
                }
            }

            return Ok(expectation.response.clone());
        }

        Err(ProcessError::MockExpectationNotMet(format!(
            "No expectation found for command: {} {:?}",
            command.program, command.args
        )))
    }
}

impl MockCommandConfig {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.expectation.args_matcher = Some(Box::new(matcher));
        self
    }

    pub fn returns_stdout(mut self, stdout: &str) -> Self {
        self.expectation.response.stdout = stdout.to_string();
        self
    }

    pub fn returns_stderr(mut self, stderr: &str) -> Self {
        self.expectation.response.stderr = stderr.to_string();
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.response.status = if code == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::Error(code)
        };
        self
    }

    pub fn returns_success(mut self) -> Self {
        self.expectation.response.status = ExitStatus::Success;
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.expected_times = Some(n);
        self
    }

    pub fn finish(self) {
        self.runner
            .expectations
            .lock()
            .unwrap()
            .push(self.expectation);
    }
}

impl Default for MockProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subprocess::ProcessCommandBuilder;

    #[tokio::test]
    async fn test_expectation_matched_by_args() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("git")
            .with_args(|args| args == ["status"])
            .returns_stdout("clean\n")
            .finish();
        mock.expect_command("git")
            .with_args(|args| args == ["log"])
            .returns_stdout("history\n")
            .finish();

        let status = mock
            .run(ProcessCommandBuilder::new("git").arg("status").build())
            .await
            .unwrap();
        assert_eq!(status.stdout, "clean\n");

        let log = mock
            .run(ProcessCommandBuilder::new("git").arg("log").build())
            .await
            .unwrap();
        assert_eq!(log.stdout, "history\n");
        assert!(mock.verify_called("git", 2));
    }

    #[tokio::test]
    async fn test_unmatched_command_errors() {
        let mock = MockProcessRunner::new();
        let result = mock
            .run(ProcessCommandBuilder::new("git").arg("push").build())
            .await;

        match result.unwrap_err() {
            ProcessError::MockExpectationNotMet(message) => {
                assert!(message.contains("push"));
            }
            other => panic!("Expected MockExpectationNotMet, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_times_limit_enforced() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("git").times(1).finish();

        let command = ProcessCommandBuilder::new("git").build();
        assert!(mock.run(command.clone()).await.is_ok());
        assert!(mock.run(command).await.is_err());
    }

    #[tokio::test]
    async fn test_exit_code_response() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("git")
            .returns_stderr("fatal: not a git repository")
            .returns_exit_code(128)
            .finish();

        let output = mock
            .run(ProcessCommandBuilder::new("git").build())
            .await
            .unwrap();
        assert_eq!(output.status, ExitStatus::Error(128));
        assert!(output.stderr.contains("fatal"));
    }
}
