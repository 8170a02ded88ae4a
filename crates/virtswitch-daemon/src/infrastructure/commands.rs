//! Shell side-effect commands and the shared external-process runner.
//!
//! Both the command lists and the ddcutil calls are *best-effort*: a failure
//! is logged and observed as an outcome value, but never promoted to a
//! transition-level error.  That contract is deliberate — side effects like
//! muting audio or changing keyboard layout must not leave the switch half
//! done just because one of them misbehaved.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, warn};

/// The observable result of one external process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The process ran to completion with this exit code.
    Exited(i32),
    /// The process was terminated by a signal before exiting.
    Signalled,
    /// The process did not finish within the configured timeout and was
    /// killed.
    TimedOut,
    /// The process could not be spawned at all.
    SpawnFailed(String),
}

impl CommandOutcome {
    /// True only for a clean zero exit.
    pub fn success(&self) -> bool {
        matches!(self, CommandOutcome::Exited(0))
    }
}

/// Runs a prepared command to completion with a bounded timeout.
///
/// The child is killed if the timeout elapses; stdin is closed so stray
/// interactive prompts cannot stall the transition.
pub(crate) async fn execute(mut command: Command, timeout: Duration) -> CommandOutcome {
    command.stdin(Stdio::null()).kill_on_drop(true);

    let status = match tokio::time::timeout(timeout, command.status()).await {
        Err(_) => return CommandOutcome::TimedOut,
        Ok(Err(err)) => return CommandOutcome::SpawnFailed(err.to_string()),
        Ok(Ok(status)) => status,
    };

    match status.code() {
        Some(code) => CommandOutcome::Exited(code),
        None => CommandOutcome::Signalled,
    }
}

/// Executes a direction's configured command list, in order, fire-and-forget.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Runs each command string through `sh -c`, in order.
    ///
    /// No command failure halts the sequence or the overall transition; each
    /// outcome is only logged.
    pub async fn run_all(&self, commands: &[String]) {
        for command in commands {
            info!(command, "running side-effect command");
            let mut invocation = Command::new("sh");
            invocation.arg("-c").arg(command);

            let outcome = execute(invocation, self.timeout).await;
            if !outcome.success() {
                warn!(command, ?outcome, "side-effect command did not succeed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[tokio::test]
    async fn test_execute_reports_zero_exit() {
        let outcome = execute(sh("exit 0"), Duration::from_secs(5)).await;
        assert_eq!(outcome, CommandOutcome::Exited(0));
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn test_execute_reports_nonzero_exit() {
        let outcome = execute(sh("exit 3"), Duration::from_secs(5)).await;
        assert_eq!(outcome, CommandOutcome::Exited(3));
        assert!(!outcome.success());
    }

    #[tokio::test]
    async fn test_execute_kills_overrunning_process() {
        let outcome = execute(sh("sleep 30"), Duration::from_millis(50)).await;
        assert_eq!(outcome, CommandOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_execute_reports_spawn_failure() {
        let command = Command::new("/nonexistent/virtswitch-test-binary");
        let outcome = execute(command, Duration::from_secs(5)).await;
        assert!(matches!(outcome, CommandOutcome::SpawnFailed(_)));
    }

    #[tokio::test]
    async fn test_run_all_continues_past_failing_commands() {
        // The failing first command must not stop the second one; observable
        // via the file the second command creates.
        let dir = std::env::temp_dir().join(format!("virtswitch-cmd-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let marker = dir.join("ran");

        let runner = CommandRunner::new(Duration::from_secs(5));
        runner
            .run_all(&[
                "exit 1".to_string(),
                format!("touch {}", marker.display()),
            ])
            .await;

        assert!(marker.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
