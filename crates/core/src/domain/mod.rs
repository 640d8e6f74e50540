// Domain Layer - Pure business logic and entities

pub mod build_config;
pub mod error;
pub mod job;
pub mod progress;
pub mod status;
pub mod text;

// Re-exports
pub use build_config::{split_file_list, BuildConfig, ProjectName};
pub use error::DomainError;
pub use job::{Job, JobId, RunOutcome, RunRecord};
pub use progress::{LineSlice, ProgressCursor};
pub use status::{JobStatus, MatchMode};
pub use text::{parse_line_count, value_for_key};
