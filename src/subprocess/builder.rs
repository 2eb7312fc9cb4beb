use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::subprocess::ProcessCommand;

pub struct ProcessCommandBuilder {
    command: ProcessCommand,
}

impl ProcessCommandBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            command: ProcessCommand {
                program: program.to_string(),
                args: Vec::new(),
                env: HashMap::new(),
                working_dir: None,
                timeout: None,
                stdin: None,
            },
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.command.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.command
            .args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.command.working_dir = Some(dir.to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.command.timeout = Some(timeout);
        self
    }

    pub fn stdin(mut self, input: String) -> Self {
        self.command.stdin = Some(input);
        self
    }

    pub fn build(self) -> ProcessCommand {
        self.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assembles_command() {
        let command = ProcessCommandBuilder::new("git")
            .args(["status", "--porcelain"])
            .arg("--branch")
            .env("GIT_TERMINAL_PROMPT", "0")
            .current_dir(Path::new("/tmp"))
            .build();

        assert_eq!(command.program, "git");
        assert_eq!(command.args, vec!["status", "--porcelain", "--branch"]);
        assert_eq!(
            command.env.get("GIT_TERMINAL_PROMPT"),
            Some(&"0".to_string())
        );
        assert_eq!(command.working_dir.as_deref(), Some(Path::new("/tmp")));
        assert!(command.timeout.is_none());
        assert!(command.stdin.is_none());
    }
}
