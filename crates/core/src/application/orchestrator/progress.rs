// Progress draining - stream a running job's partial output exactly once

use super::JobLifecycleOrchestrator;
use crate::application::constants::{COMMUNICATION_FILE, PROGRESS_FILE};
use crate::domain::{parse_line_count, Job, ProgressCursor};
use crate::error::{AppError, Result};
use tracing::{debug, warn};

impl JobLifecycleOrchestrator {
    /// One drain cycle; remote failures skip the cycle without moving the cursor
    pub(super) async fn drain_progress(&self, job: &Job, cursor: &mut ProgressCursor) -> Result<()> {
        match self.try_drain_progress(job, cursor).await {
            Ok(()) => Ok(()),
            Err(e @ (AppError::Remote(_) | AppError::Sync(_))) => {
                warn!(job_id = %job.id, error = %e, "Progress query failed, skipping cycle");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn try_drain_progress(&self, job: &Job, cursor: &mut ProgressCursor) -> Result<()> {
        self.batch
            .create_job_progress_file(&job.id, PROGRESS_FILE)
            .await?;

        self.runner
            .run(&format!(
                "#!/bin/bash +x\nwc -l {} > {}",
                PROGRESS_FILE, COMMUNICATION_FILE
            ))
            .await?;
        let count = self.channel.fetch().await?;
        let Some(total) = parse_line_count(&count) else {
            debug!(job_id = %job.id, output = %count.trim(), "Line count unavailable");
            return Ok(());
        };

        if let Some(slice) = cursor.pending_slice(total) {
            let output = self
                .batch
                .running_output_slice(PROGRESS_FILE, slice)
                .await?;
            if !output.is_empty() {
                self.print_job_output(&output);
            }
        }
        cursor.advance_to(total);
        Ok(())
    }
}
