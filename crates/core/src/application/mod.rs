// Application Layer - Use Cases and Job Orchestration

pub mod batch;
pub mod cancel;
pub mod constants;
pub mod orchestrator;
pub mod project;
pub mod retry;

// Re-exports
pub use batch::{BatchSystem, CommunicationChannel, Dialect, GridEngine, Lsf, SchedulerAdapter};
pub use cancel::{cancel_channel, CancelHandle, CancelToken};
pub use orchestrator::JobLifecycleOrchestrator;
pub use project::ProjectService;
pub use retry::RetryPolicy;
