// Batch System Adapter
//
// Translates generic orchestration calls into scheduler commands and parses
// the scheduler's text output. One algorithm, parameterized by `Dialect`.

mod adapter;
pub mod channel;
pub mod dialect;

pub use adapter::SchedulerAdapter;
pub use channel::CommunicationChannel;
pub use dialect::{Dialect, GridEngine, Lsf};

use crate::domain::{JobId, JobStatus, LineSlice, MatchMode, ProgressCursor};
use crate::error::Result;
use async_trait::async_trait;

/// Batch scheduler operations used by the job orchestrator
///
/// Classification predicates are pure and derived from `classify`; only the
/// match mode is scheduler specific.
#[async_trait]
pub trait BatchSystem: Send + Sync {
    fn match_mode(&self) -> MatchMode;

    fn classify(&self, raw_status: &str) -> JobStatus {
        JobStatus::classify(raw_status, self.match_mode())
    }

    fn is_running_status(&self, raw_status: &str) -> bool {
        self.classify(raw_status).is_running()
    }

    fn is_end_status(&self, raw_status: &str) -> bool {
        self.classify(raw_status).is_end()
    }

    fn job_exited_with_errors(&self, raw_status: &str) -> bool {
        self.classify(raw_status).exited_with_errors()
    }

    fn job_completed_successfully(&self, raw_status: &str) -> bool {
        self.classify(raw_status).completed_successfully()
    }

    /// Print one human-readable explanation of the status; never fails
    fn process_status(&self, raw_status: &str);

    /// Submit the script; returns the failure sentinel id if not acknowledged
    async fn submit_job(&self, script_name: &str, send_email: bool, queue: &str)
        -> Result<JobId>;

    /// Raw status token of the job
    async fn job_status(&self, job_id: &str) -> Result<String>;

    async fn kill_job(&self, job_id: &str) -> Result<()>;

    /// Print the captured error log of the last remote round
    async fn print_error_log(&self) -> Result<()>;

    /// Resolve and print the job's exit status
    async fn print_exit_code(&self, job_id: &str) -> Result<()>;

    /// Copy the accumulated scheduler output into `progress_file` on the host
    async fn create_job_progress_file(&self, job_id: &str, progress_file: &str) -> Result<()>;

    /// Lines of `progress_file` covered by `slice`
    async fn running_output_slice(&self, progress_file: &str, slice: LineSlice) -> Result<String>;

    /// Scheduler output after the lines already streamed
    async fn finished_output(&self, job_id: &str, cursor: ProgressCursor) -> Result<String>;

    /// Remove transient per-job artifacts on the host
    async fn clean_up_files(&self, job_id: &str) -> Result<()>;
}
