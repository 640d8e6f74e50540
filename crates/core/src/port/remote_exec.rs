// Remote Command Runner Port
// Executes a command line on the execution host and reports completion

use async_trait::async_trait;
use thiserror::Error;

/// Result of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Non-empty output lines, stdout first
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .filter(|l| !l.trim().is_empty())
    }
}

/// Remote execution errors
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

/// Remote command runner trait
///
/// Implementations:
/// - ShellCommandRunner: pipes the script into a launcher (`bash -s`, `ssh host bash -s`)
#[async_trait]
pub trait RemoteCommandRunner: Send + Sync {
    /// Run a bash script in the host working directory
    ///
    /// A nonzero exit code is reported in `CommandOutput`, not as an error.
    ///
    /// # Errors
    /// - RemoteError::SpawnFailed if the launcher cannot be started
    /// - RemoteError::IoError if the script cannot be delivered or collected
    /// - RemoteError::Timeout if the command outlived the runner's limit
    async fn run(&self, script: &str) -> Result<CommandOutput, RemoteError>;
}
