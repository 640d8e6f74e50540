// Port Layer - Interfaces for external collaborators

pub mod config_store;
pub mod console;
pub mod file_sync;
pub mod id_provider; // For deterministic script names in tests
pub mod mocks;
pub mod remote_exec;
pub mod sleeper;
pub mod time_provider;

// Re-exports
pub use config_store::{BuildConfigStore, RunHistory};
pub use console::{JobConsole, StdoutConsole};
pub use file_sync::{FileSync, SyncError};
pub use id_provider::IdProvider;
pub use remote_exec::{CommandOutput, RemoteCommandRunner, RemoteError};
pub use sleeper::{Sleeper, TokioSleeper};
pub use time_provider::TimeProvider;
