// Batchpilot Infrastructure - System Adapters
// Implements: RemoteCommandRunner, FileSync

pub mod local_sync;
pub mod shell_runner;

pub use local_sync::LocalFileSync;
pub use shell_runner::{ShellCommandRunner, DEFAULT_ENV_ALLOWLIST};
