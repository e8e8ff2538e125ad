//! Command runner
//!
//! Executes external commands and reduces their outcome to a pass/fail
//! signal, logging stdout on success and stderr on failure.

use anyhow::{Context, Result};
use std::fmt;
use std::str::FromStr;
use tokio::process::Command;
use tracing::{debug, error};

/// An external command as a program plus argument vector
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl HostCommand {
    /// Create a command with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a single argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program followed by its arguments
    pub fn into_argv(self) -> Vec<String> {
        std::iter::once(self.program).chain(self.args).collect()
    }

    /// Whether the argument vector contains `needle`
    #[cfg(test)]
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl FromStr for HostCommand {
    type Err = anyhow::Error;

    /// Split a command line on whitespace. No shell quoting is applied.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let program = parts.next().context("Empty command line")?;
        Ok(Self::new(program).args(parts))
    }
}

/// Captured outcome of one command invocation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: Option<String>,
}

impl CommandOutput {
    #[cfg(test)]
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: Option<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Port for launching external processes
#[allow(async_fn_in_trait)]
pub trait CommandExecutor {
    /// Run the command to completion. A non-zero exit is not an error;
    /// `Err` means the process could not be launched at all.
    async fn execute(&self, command: &HostCommand) -> Result<CommandOutput>;
}

/// Executor backed by real host processes
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    async fn execute(&self, command: &HostCommand) -> Result<CommandOutput> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .output()
            .await
            .with_context(|| format!("Failed to execute `{command}`"))?;

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        Ok(CommandOutput {
            // Killed by a signal
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: if stderr.is_empty() { None } else { Some(stderr) },
        })
    }
}

/// Runs commands through an executor and applies the logging policy
pub struct CommandRunner<E> {
    executor: E,
}

impl<E: CommandExecutor> CommandRunner<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    #[cfg(test)]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run a command, returning true iff it exited with status 0.
    ///
    /// Stdout is logged at debug level on success. Stderr is logged at
    /// error level on failure only when `log_stderr` is set.
    pub async fn run_command(&self, command: &HostCommand, log_stderr: bool) -> bool {
        self.run_capture(command, log_stderr).await.is_some()
    }

    /// Like [`run_command`](Self::run_command) but hands back stdout on success
    pub async fn run_capture(&self, command: &HostCommand, log_stderr: bool) -> Option<String> {
        match self.executor.execute(command).await {
            Ok(output) if evaluate(command, &output, log_stderr) => Some(output.stdout),
            Ok(_) => None,
            Err(e) => {
                if log_stderr {
                    error!("{:#}", e);
                } else {
                    debug!("{:#}", e);
                }
                None
            }
        }
    }
}

/// Apply the logging policy to a finished command and reduce it to a bool
fn evaluate(command: &HostCommand, output: &CommandOutput, log_stderr: bool) -> bool {
    if output.success() {
        debug!("`{}` succeeded: {}", command, output.stdout.trim_end());
        return true;
    }

    if log_stderr {
        error!(
            "`{}` exited with {}: {}",
            command,
            output.exit_code,
            output.stderr.as_deref().unwrap_or("").trim_end()
        );
    } else {
        debug!("`{}` exited with {}", command, output.exit_code);
    }

    false
}
