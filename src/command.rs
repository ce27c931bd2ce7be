use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    /// Exit status for error messages: "exit 9" or "signal".
    pub fn describe(&self) -> String {
        match self.code {
            Some(code) => format!("exit {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Seam for every host command the operator issues
/// (account tools, chown, systemctl, the exporter binary).
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` to completion. `Err` only when the process
    /// could not be spawned; a non-zero exit is reported through the output.
    async fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput>;
}

/// Runs commands directly on the local host.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        debug!(program, ?args, "Running command");

        let output = Command::new(program).args(args).output().await?;

        debug!(
            program,
            code = ?output.status.code(),
            "Command finished"
        );
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_system_runner_captures_streams() {
        let runner = SystemCommandRunner::new();
        let output = runner
            .run("sh", &["-c", "echo out; echo err >&2; exit 3"])
            .await
            .unwrap();

        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(output.stderr_lossy(), "err");
        assert_eq!(output.describe(), "exit 3");
    }

    #[tokio::test]
    async fn test_system_runner_spawn_failure_is_err() {
        let runner = SystemCommandRunner::new();
        let result = runner.run("/nonexistent/definitely-not-here", &[]).await;
        assert!(result.is_err());
    }
}
