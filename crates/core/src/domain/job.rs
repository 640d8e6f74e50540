// Job Domain Model

use crate::domain::status::{JobStatus, MatchMode};
use serde::{Deserialize, Serialize};

/// Scheduler-assigned job id
pub type JobId = String;

/// Job id recorded when the scheduler never acknowledged the submission
pub const SUBMISSION_FAILED_JOB_ID: &str = "0";

/// Prefix of every generated job script name (`JOB-<uuid>`)
pub const JOB_SCRIPT_PREFIX: &str = "JOB-";

/// A job handed to the batch scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Name of the generated script in the host working directory
    pub script_name: String,
    pub queue: String,
    /// Last raw status token; empty until the first poll
    pub raw_status: String,
}

impl Job {
    /// Create a job from the submit result
    ///
    /// # Arguments
    /// * `id` - Id returned by the adapter (possibly the failure sentinel)
    /// * `script_name` - Generated script name
    /// * `queue` - Target queue
    pub fn submitted(
        id: impl Into<String>,
        script_name: impl Into<String>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            script_name: script_name.into(),
            queue: queue.into(),
            raw_status: String::new(),
        }
    }

    /// True when the id came from a real submission acknowledgment
    pub fn is_submitted(&self) -> bool {
        self.id != SUBMISSION_FAILED_JOB_ID
    }

    pub fn status(&self, mode: MatchMode) -> JobStatus {
        JobStatus::classify(&self.raw_status, mode)
    }
}

/// Everything a caller may want to know about a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub job_id: JobId,
    pub final_status: String,
    pub succeeded: bool,
}

/// Persisted summary of one orchestrated run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub project: String,
    pub job_id: JobId,
    pub final_status: String,
    pub succeeded: bool,
    pub started_at: i64, // epoch ms
    pub finished_at: i64,
}
