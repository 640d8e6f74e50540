// Job Status Taxonomy
//
// Classification is a pure function of the raw scheduler token. Dialects only
// choose how letter tokens are matched (exact vs. first-character prefix).

use serde::{Deserialize, Serialize};

/// Token reported for a job that never reached the scheduler.
pub const SUBMISSION_FAILED_STATUS: &str = "J";

/// Exit status of a job that finished without errors.
pub const SUCCEEDED_STATUS: &str = "0";

/// Marker forced by the orchestrator when polling is cancelled.
pub const ABORTED_STATUS: &str = "ABORTED";

/// How letter tokens are compared against the known vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Token must equal the letter (`r`, `E`, ...)
    Exact,
    /// Token must start with the letter; modifiers like `Eqw` or `hr` are allowed
    Prefix,
}

impl MatchMode {
    fn matches(self, token: &str, letter: char) -> bool {
        match self {
            MatchMode::Exact => {
                let mut chars = token.chars();
                chars.next() == Some(letter) && chars.next().is_none()
            }
            MatchMode::Prefix => token.starts_with(letter),
        }
    }
}

/// Classified job status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Queued,
    Transferring,
    Running,
    SuspendedByUser,
    SuspendedByQueue,
    /// Suspended because a queue suspend threshold was exceeded
    SuspendedByThreshold,
    Held,
    Deleting,
    Restarted,
    /// Could not be started due to job properties
    Error,
    Succeeded,
    FailedSubmission,
    FailedExit(u32),
    Aborted,
    Unknown(String),
}

impl JobStatus {
    /// Classify a raw scheduler token
    pub fn classify(token: &str, mode: MatchMode) -> Self {
        let token = token.trim();

        if token == ABORTED_STATUS {
            return JobStatus::Aborted;
        }
        if token == SUBMISSION_FAILED_STATUS {
            return JobStatus::FailedSubmission;
        }
        if token == SUCCEEDED_STATUS {
            return JobStatus::Succeeded;
        }
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            // Only the literal "0" is success; exit codes wider than u32 are still failures
            return JobStatus::FailedExit(token.parse().unwrap_or(u32::MAX));
        }

        const LETTERS: [(char, JobStatus); 11] = [
            ('d', JobStatus::Deleting),
            ('t', JobStatus::Transferring),
            ('r', JobStatus::Running),
            ('s', JobStatus::SuspendedByUser),
            ('S', JobStatus::SuspendedByQueue),
            ('T', JobStatus::SuspendedByThreshold),
            ('R', JobStatus::Restarted),
            ('w', JobStatus::Pending),
            ('h', JobStatus::Held),
            ('E', JobStatus::Error),
            ('q', JobStatus::Queued),
        ];

        LETTERS
            .iter()
            .find(|(letter, _)| mode.matches(token, *letter))
            .map(|(_, status)| status.clone())
            .unwrap_or_else(|| JobStatus::Unknown(token.to_string()))
    }

    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running)
    }

    pub fn completed_successfully(&self) -> bool {
        matches!(self, JobStatus::Succeeded)
    }

    /// Explicit error token, failed submission, or a nonzero exit code
    pub fn exited_with_errors(&self) -> bool {
        matches!(
            self,
            JobStatus::Error | JobStatus::FailedSubmission | JobStatus::FailedExit(_)
        )
    }

    /// Terminal statuses end the poll loop
    pub fn is_end(&self) -> bool {
        self.completed_successfully() || self.exited_with_errors()
    }

    /// Human-readable explanation, one line per status
    pub fn narration(&self) -> String {
        match self {
            JobStatus::Deleting => {
                "A cancellation command has been used to initiate deletion of this job.".into()
            }
            JobStatus::Transferring => {
                "This job is transferring and about to be executed.".into()
            }
            JobStatus::Running => "This job is running.".into(),
            JobStatus::SuspendedByUser => {
                "This job was suspended by the user via the scheduler's modify command.".into()
            }
            JobStatus::SuspendedByQueue => "The queue containing this job is suspended \
                and therefore this job is also suspended."
                .into(),
            JobStatus::SuspendedByThreshold => "This job was suspended because at least one \
                suspend threshold of its queue has been exceeded."
                .into(),
            JobStatus::Restarted => "This job has been restarted. This can be caused by a job \
                migration or because the job was marked as rerunnable."
                .into(),
            JobStatus::Pending => "This job is waiting pending execution.".into(),
            JobStatus::Held => "This job is not eligible for execution because it has been \
                assigned a hold state or is waiting for completion of the jobs it depends on."
                .into(),
            JobStatus::Error => "This job could not be started due to job properties. \
                The scheduler's job detail query shows the reason for the error."
                .into(),
            JobStatus::Queued => "This job is queued and awaiting execution.".into(),
            JobStatus::FailedSubmission => {
                "Batchpilot failed to even submit this job to the scheduler.".into()
            }
            JobStatus::Succeeded => "This job has completed successfully.".into(),
            JobStatus::FailedExit(code) => {
                format!("The job failed with exit status '{}'.", code)
            }
            JobStatus::Aborted => "This job was aborted before it finished.".into(),
            JobStatus::Unknown(token) => format!("Job status '{}' is not recognized.", token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: [MatchMode; 2] = [MatchMode::Exact, MatchMode::Prefix];

    #[test]
    fn test_numeric_tokens_are_exit_codes() {
        for mode in MODES {
            for token in ["0", "1", "2", "42", "137", "255", "00", "007"] {
                let status = JobStatus::classify(token, mode);
                assert_eq!(status.exited_with_errors(), token != "0", "token {token}");
                assert_eq!(status.completed_successfully(), token == "0", "token {token}");
            }
        }
    }

    #[test]
    fn test_huge_exit_code_still_fails() {
        let status = JobStatus::classify("99999999999999999999", MatchMode::Exact);
        assert_eq!(status, JobStatus::FailedExit(u32::MAX));
        assert!(status.exited_with_errors());
    }

    #[test]
    fn test_end_status_is_success_or_error_never_both() {
        let tokens = [
            "", "r", "t", "d", "s", "S", "T", "R", "w", "h", "E", "q", "qw", "Eqw", "hqw", "Rr",
            "J", "0", "1", "13", "ABORTED", "x", "running", "-1",
        ];
        for mode in MODES {
            for token in tokens {
                let status = JobStatus::classify(token, mode);
                assert_eq!(
                    status.is_end(),
                    status.completed_successfully() || status.exited_with_errors()
                );
                assert!(!(status.completed_successfully() && status.exited_with_errors()));
            }
        }
    }

    #[test]
    fn test_exact_mode_rejects_modifiers() {
        assert_eq!(JobStatus::classify("r", MatchMode::Exact), JobStatus::Running);
        assert_eq!(
            JobStatus::classify("Eqw", MatchMode::Exact),
            JobStatus::Unknown("Eqw".to_string())
        );
        assert!(!JobStatus::classify("Eqw", MatchMode::Exact).is_end());
    }

    #[test]
    fn test_prefix_mode_accepts_modifiers() {
        assert_eq!(JobStatus::classify("Eqw", MatchMode::Prefix), JobStatus::Error);
        assert_eq!(JobStatus::classify("hqw", MatchMode::Prefix), JobStatus::Held);
        assert_eq!(JobStatus::classify("qw", MatchMode::Prefix), JobStatus::Queued);
        assert_eq!(JobStatus::classify("Rr", MatchMode::Prefix), JobStatus::Restarted);
        assert!(JobStatus::classify("Eqw", MatchMode::Prefix).exited_with_errors());
    }

    #[test]
    fn test_markers_are_mode_independent() {
        for mode in MODES {
            assert_eq!(JobStatus::classify("J", mode), JobStatus::FailedSubmission);
            assert_eq!(JobStatus::classify("ABORTED", mode), JobStatus::Aborted);
            assert!(!JobStatus::classify("ABORTED", mode).is_end());
            assert!(!JobStatus::classify("ABORTED", mode).completed_successfully());
        }
    }

    #[test]
    fn test_empty_token_is_not_terminal() {
        let status = JobStatus::classify("", MatchMode::Prefix);
        assert!(!status.is_end());
        assert!(!status.is_running());
    }

    #[test]
    fn test_every_status_narrates_one_line() {
        for mode in MODES {
            for token in ["d", "t", "r", "s", "S", "T", "R", "w", "h", "E", "q", "J", "0", "3", "zz"]
            {
                let line = JobStatus::classify(token, mode).narration();
                assert!(!line.is_empty());
                assert!(!line.contains('\n'), "narration for {token} spans lines");
            }
        }
    }
}
