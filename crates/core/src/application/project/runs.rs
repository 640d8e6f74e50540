// Run history bookkeeping

use super::ProjectService;
use crate::domain::{RunOutcome, RunRecord};
use crate::error::Result;
use tracing::debug;

impl ProjectService {
    /// Current time according to the injected clock
    pub fn now_millis(&self) -> i64 {
        self.time_provider.now_millis()
    }

    /// Persist the outcome of a run that started at `started_at`
    pub async fn record_run(
        &self,
        project: &str,
        outcome: &RunOutcome,
        started_at: i64,
    ) -> Result<RunRecord> {
        let record = RunRecord {
            id: self.id_provider.generate_id(),
            project: project.to_string(),
            job_id: outcome.job_id.clone(),
            final_status: outcome.final_status.clone(),
            succeeded: outcome.succeeded,
            started_at,
            finished_at: self.time_provider.now_millis(),
        };
        self.history.record(&record).await?;
        debug!(run_id = %record.id, project = %project, "Run recorded");
        Ok(record)
    }

    pub async fn recent_runs(&self, project: &str, limit: u32) -> Result<Vec<RunRecord>> {
        self.history.recent(project, limit).await
    }
}
