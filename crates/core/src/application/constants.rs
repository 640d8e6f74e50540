// Orchestration constants (no magic values)
use std::time::Duration;

/// Scratch file carrying the text result of the latest remote command back
/// to the controller. Overwritten every round.
pub const COMMUNICATION_FILE: &str = "output";

/// Host-side copy of the scheduler output taken while the job runs
pub const PROGRESS_FILE: &str = "jobProgress";

/// Accounting queries attempted before assuming success
pub const ACCOUNTING_MAX_ATTEMPTS: u32 = 10;

/// Pause between accounting attempts; accounting may lag job completion
pub const ACCOUNTING_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Key of the exit status row in the accounting report
pub const EXIT_STATUS_KEY: &str = "exit_status";

/// Banner around streamed job output
pub const JOB_OUTPUT_START_BANNER: &str = "---------------------------------------------------\
JOB OUTPUT START---------------------------------------------------";
pub const JOB_OUTPUT_END_BANNER: &str = "---------------------------------------------------\
JOB OUTPUT END-----------------------------------------------------";
