//! Command execution module
//!
//! Provides the process-launching port and the command runner that
//! every provisioning step goes through.

mod runner;

pub use runner::{CommandExecutor, CommandOutput, CommandRunner, HostCommand, SystemExecutor};

#[cfg(test)]
pub mod testing {
    //! Scripted executor for exercising provisioning chains without processes

    use super::{CommandExecutor, CommandOutput, HostCommand};
    use anyhow::Result;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns queued outputs in order, then the fallback, and records
    /// every command it was asked to run.
    pub struct ScriptedExecutor {
        queue: Mutex<VecDeque<CommandOutput>>,
        fallback: CommandOutput,
        calls: Mutex<Vec<HostCommand>>,
    }

    impl ScriptedExecutor {
        pub fn new() -> Self {
            Self {
                queue: Mutex::new(VecDeque::new()),
                fallback: CommandOutput::new(0, "", None),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Queue one output
        pub fn then(self, output: CommandOutput) -> Self {
            self.queue.lock().unwrap().push_back(output);
            self
        }

        /// Queue `n` successful outputs with empty stdout
        pub fn ok_times(mut self, n: usize) -> Self {
            for _ in 0..n {
                self = self.then(CommandOutput::new(0, "", None));
            }
            self
        }

        /// Queue a successful output with the given stdout
        pub fn ok_with(self, stdout: &str) -> Self {
            self.then(CommandOutput::new(0, stdout, None))
        }

        /// Queue a failing output
        pub fn fail(self) -> Self {
            self.then(CommandOutput::new(1, "", Some("error: not found".to_string())))
        }

        /// Output used once the queue is drained
        pub fn otherwise(mut self, output: CommandOutput) -> Self {
            self.fallback = output;
            self
        }

        /// Fail every command once the queue is drained
        pub fn otherwise_fail(self) -> Self {
            self.otherwise(CommandOutput::new(1, "", Some("error".to_string())))
        }

        pub fn calls(&self) -> Vec<HostCommand> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        /// Commands whose first argument is `subcommand`
        pub fn calls_to(&self, subcommand: &str) -> Vec<HostCommand> {
            self.calls()
                .into_iter()
                .filter(|c| c.args.first().map(String::as_str) == Some(subcommand))
                .collect()
        }
    }

    impl CommandExecutor for ScriptedExecutor {
        async fn execute(&self, command: &HostCommand) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(command.clone());
            let next = self.queue.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| self.fallback.clone()))
        }
    }
}
