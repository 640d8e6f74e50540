// Job Lifecycle Orchestrator
//
// Drives one job end to end: stage, submit, poll, stream, finalize, clean up.
// Cleanup runs on every path once staging has started; job failures surface
// as `succeeded == false`, never as an error.

mod cleanup;
mod progress;
mod staging;

pub use staging::compose_job_script;

use crate::application::batch::{BatchSystem, CommunicationChannel};
use crate::application::cancel::CancelToken;
use crate::application::constants::{JOB_OUTPUT_END_BANNER, JOB_OUTPUT_START_BANNER};
use crate::domain::status::ABORTED_STATUS;
use crate::domain::{BuildConfig, Job, ProgressCursor, RunOutcome};
use crate::error::{AppError, Result};
use crate::port::{FileSync, IdProvider, JobConsole, RemoteCommandRunner, Sleeper};
use staging::StagedJob;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Runs jobs through a batch scheduler on one execution host
pub struct JobLifecycleOrchestrator {
    batch: Arc<dyn BatchSystem>,
    runner: Arc<dyn RemoteCommandRunner>,
    file_sync: Arc<dyn FileSync>,
    channel: CommunicationChannel,
    console: Arc<dyn JobConsole>,
    sleeper: Arc<dyn Sleeper>,
    id_provider: Arc<dyn IdProvider>,
}

impl JobLifecycleOrchestrator {
    /// Create a new orchestrator
    ///
    /// # Arguments
    /// * `batch` - Scheduler adapter
    /// * `runner` - Executes scripts in the host working directory
    /// * `channel` - Communication file channel; its directory is the
    ///   project's controller directory
    /// * `console` - Job console shown to the person who started the run
    /// * `sleeper` - Poll interval clock
    /// * `id_provider` - Source of job script names
    pub fn new(
        batch: Arc<dyn BatchSystem>,
        runner: Arc<dyn RemoteCommandRunner>,
        channel: CommunicationChannel,
        console: Arc<dyn JobConsole>,
        sleeper: Arc<dyn Sleeper>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            batch,
            runner,
            file_sync: channel.file_sync(),
            channel,
            console,
            sleeper,
            id_provider,
        }
    }

    /// Run the job and report only whether it completed successfully
    pub async fn run(
        &self,
        config: &BuildConfig,
        result_dir: &Path,
        cancel: CancelToken,
    ) -> Result<bool> {
        Ok(self.execute(config, result_dir, cancel).await?.succeeded)
    }

    /// Run the job described by `config`
    ///
    /// `result_dir` receives downloaded files when the configuration names
    /// no destination. Cancelling `cancel` while the job is being polled
    /// kills it and records the aborted marker as its final status. A token
    /// already cancelled when staging finishes stops the run before anything
    /// reaches the scheduler and yields [`AppError::Cancelled`].
    pub async fn execute(
        &self,
        config: &BuildConfig,
        result_dir: &Path,
        mut cancel: CancelToken,
    ) -> Result<RunOutcome> {
        config.validate()?;
        let interval = poll_interval(config.poll_interval_minutes)?;

        let mut staged = StagedJob::default();
        if let Err(e) = self.stage(config, &mut staged).await {
            warn!(project = %config.project, error = %e, "Staging failed");
            self.clean_up_controller(&staged).await;
            return Err(e);
        }

        if cancel.is_cancelled() {
            warn!(project = %config.project, "Run cancelled before submission");
            self.clean_up_host(config, &staged).await;
            self.clean_up_controller(&staged).await;
            return Err(AppError::Cancelled);
        }

        let job_id = match self
            .batch
            .submit_job(&staged.script_name, config.send_email, &config.queue)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(script = %staged.script_name, error = %e, "Submission failed");
                self.clean_up_host(config, &staged).await;
                self.clean_up_controller(&staged).await;
                return Err(e);
            }
        };
        let mut job = Job::submitted(job_id, &staged.script_name, &config.queue);

        let monitored = tokio::select! {
            result = self.monitor(&mut job, config, result_dir, interval) => Some(result),
            _ = cancel.cancelled() => None,
        };
        let result = match monitored {
            Some(result) => result,
            None => {
                self.abort(&mut job).await;
                Ok(())
            }
        };

        self.clean_up(&job, config, &staged).await;
        result?;

        let succeeded = self.batch.job_completed_successfully(&job.raw_status);
        info!(
            job_id = %job.id,
            final_status = %job.raw_status,
            succeeded = %succeeded,
            "Run finished"
        );
        Ok(RunOutcome {
            job_id: job.id,
            final_status: job.raw_status,
            succeeded,
        })
    }

    /// Poll until an end status, then emit the remaining output and download
    async fn monitor(
        &self,
        job: &mut Job,
        config: &BuildConfig,
        result_dir: &Path,
        interval: Duration,
    ) -> Result<()> {
        let mut cursor = ProgressCursor::new();

        while !self.batch.is_end_status(&job.raw_status) {
            self.sleeper.sleep(interval).await;
            job.raw_status = self.batch.job_status(&job.id).await?;
            self.console.line(&format!("JOB STATUS: {}", job.raw_status));
            self.batch.process_status(&job.raw_status);

            if self.batch.is_running_status(&job.raw_status) {
                self.drain_progress(job, &mut cursor).await?;
            }
        }

        // The communication file still holds the submit diagnostic
        if !job.is_submitted() {
            return Ok(());
        }

        let output = self.batch.finished_output(&job.id, cursor).await?;
        self.print_job_output(&output);
        self.download_files(config, result_dir).await
    }

    async fn abort(&self, job: &mut Job) {
        warn!(job_id = %job.id, last_status = %job.raw_status, "Run cancelled, killing job");
        if job.is_submitted() {
            if let Err(e) = self.batch.kill_job(&job.id).await {
                warn!(job_id = %job.id, error = %e, "Failed to kill job");
            }
        }
        job.raw_status = ABORTED_STATUS.to_string();
    }

    /// Copy the requested outputs back to the controller
    async fn download_files(&self, config: &BuildConfig, result_dir: &Path) -> Result<()> {
        if config.files_to_download.is_empty() {
            return Ok(());
        }
        self.console.blank();
        self.console.line("Downloading the selected files:");

        let destination = config.download_destination.as_deref().unwrap_or(result_dir);
        for file in &config.files_to_download {
            self.console.line(&format!("    {}", file));
        }
        self.file_sync
            .fetch_from_host(&config.files_to_download, destination)
            .await?;
        info!(
            files = config.files_to_download.len(),
            destination = %destination.display(),
            "Downloaded job outputs"
        );
        Ok(())
    }

    fn print_job_output(&self, output: &str) {
        self.console.line(JOB_OUTPUT_START_BANNER);
        self.console.blank();
        self.console
            .line(output.strip_suffix('\n').unwrap_or(output));
        self.console.line(JOB_OUTPUT_END_BANNER);
    }
}

fn poll_interval(minutes: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(minutes * 60.0).map_err(|e| {
        AppError::Validation(format!("Invalid poll interval of {} minutes: {}", minutes, e))
    })
}
