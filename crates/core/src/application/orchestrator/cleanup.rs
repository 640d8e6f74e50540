// Cleanup - always runs, never fails the run

use super::staging::{shell_quote, StagedJob};
use super::JobLifecycleOrchestrator;
use crate::application::constants::{COMMUNICATION_FILE, PROGRESS_FILE};
use crate::domain::{BuildConfig, Job};
use tracing::{info, warn};

impl JobLifecycleOrchestrator {
    pub(super) async fn clean_up(&self, job: &Job, config: &BuildConfig, staged: &StagedJob) {
        if self.batch.job_exited_with_errors(&job.raw_status) {
            self.console.blank();
            if let Err(e) = self.batch.print_error_log().await {
                warn!(job_id = %job.id, error = %e, "Failed to print error log");
            }
            if let Err(e) = self.batch.print_exit_code(&job.id).await {
                warn!(job_id = %job.id, error = %e, "Failed to print exit code");
            }
        }

        if let Err(e) = self.batch.clean_up_files(&job.id).await {
            warn!(job_id = %job.id, error = %e, "Scheduler cleanup failed");
        }
        self.clean_up_host(config, staged).await;
        self.clean_up_controller(staged).await;
        info!(job_id = %job.id, "Cleanup finished");
    }

    /// Remove the script, scratch files and staged copies from the host
    pub(super) async fn clean_up_host(&self, config: &BuildConfig, staged: &StagedJob) {
        let mut files = vec![PROGRESS_FILE.to_string(), COMMUNICATION_FILE.to_string()];
        if !staged.script_name.is_empty() {
            files.insert(0, staged.script_name.clone());
        }
        files.extend(config.uploaded_files.iter().cloned());
        files.extend(config.files_to_download.iter().cloned());
        files.extend(config.sent_file_names());

        let quoted: Vec<String> = files.iter().map(|f| shell_quote(f)).collect();
        if let Err(e) = self.runner.run(&format!("rm -f {}", quoted.join(" "))).await {
            warn!(error = %e, "Host cleanup failed");
        }
    }

    /// Remove controller-side copies created for this run
    pub(super) async fn clean_up_controller(&self, staged: &StagedJob) {
        for path in &staged.controller_copies {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove staged file");
                }
            }
        }
        if let Err(e) = self.channel.remove_local().await {
            warn!(error = %e, "Failed to remove communication file");
        }
    }
}
