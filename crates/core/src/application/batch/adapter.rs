// Scheduler Adapter - shared submit/status/accounting algorithm
use super::{BatchSystem, CommunicationChannel, Dialect};
use crate::application::constants::{COMMUNICATION_FILE, EXIT_STATUS_KEY};
use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::job::{JOB_SCRIPT_PREFIX, SUBMISSION_FAILED_JOB_ID};
use crate::domain::status::{SUBMISSION_FAILED_STATUS, SUCCEEDED_STATUS};
use crate::domain::{value_for_key, JobId, LineSlice, MatchMode, ProgressCursor};
use crate::error::Result;
use crate::port::{CommandOutput, JobConsole, RemoteCommandRunner, Sleeper};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

const ACK_PREFIX: &str = "Your job ";
const ACK_SUFFIX: &str = " has been submitted";

/// Extract the job id from a submit acknowledgment line
///
/// `Your job 42 ("build") has been submitted` yields `42`.
pub fn parse_submit_ack(line: &str) -> Option<String> {
    let line = line.trim();
    if !line.starts_with(ACK_PREFIX) || !line.ends_with(ACK_SUFFIX) {
        return None;
    }
    line.split(' ').nth(2).map(str::to_string)
}

/// Batch system adapter for one scheduler dialect
pub struct SchedulerAdapter<D: Dialect> {
    dialect: D,
    runner: Arc<dyn RemoteCommandRunner>,
    channel: CommunicationChannel,
    console: Arc<dyn JobConsole>,
    sleeper: Arc<dyn Sleeper>,
    retry_policy: RetryPolicy,
}

impl<D: Dialect> SchedulerAdapter<D> {
    pub fn new(
        dialect: D,
        runner: Arc<dyn RemoteCommandRunner>,
        channel: CommunicationChannel,
        console: Arc<dyn JobConsole>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            dialect,
            runner,
            channel,
            console,
            sleeper,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Run a script whose output nobody needs to see
    async fn run_quiet(&self, script: &str) -> Result<CommandOutput> {
        let output = self.runner.run(script).await?;
        if !output.success() {
            debug!(
                scheduler = %self.dialect.name(),
                exit_code = ?output.exit_code,
                stderr = %output.stderr.trim(),
                "Remote command exited with nonzero status"
            );
        }
        Ok(output)
    }

    /// Run a script and echo its output to the job console
    async fn run_visible(&self, script: &str) -> Result<CommandOutput> {
        let output = self.run_quiet(script).await?;
        for line in output.lines() {
            self.console.line(line);
        }
        Ok(output)
    }

    /// Run `command > COMMUNICATION_FILE` and read the result back
    async fn query(&self, command: &str) -> Result<String> {
        self.run_quiet(&format!("#!/bin/bash +x\n{} > {}", command, COMMUNICATION_FILE))
            .await?;
        self.channel.fetch().await
    }

    fn submit_script(&self, script_name: &str, send_email: bool, queue: &str) -> (String, String) {
        let d = &self.dialect;
        let program = d.program(d.submit_program());
        let rescued = d.rescued_job_name_var();
        let job_name = format!("${{{}//\\//.}}", rescued);

        let preamble = format!(
            "#!/bin/bash +x\n\
             set +x\n\
             rm -f {comm}\n\
             if [ ! -x {program} ]; then\n    \
                 echo \"ERROR: batchpilot setup: directory {bin}='${bin}' does not contain \
             an executable {name} '{submit}' command.\" > {comm} 2>&1\n    \
                 exit 1\n\
             fi\n\
             set -x\n\
             export {rescued}=\"${{JOB_NAME:-batchpilot}}\"\n\
             rm -f {output}\n",
            comm = COMMUNICATION_FILE,
            program = program,
            bin = d.bin_var(),
            name = d.name(),
            submit = d.submit_program(),
            rescued = rescued,
            output = d.output_file(),
        );

        let command = format!(
            "{}{} {}  &> {}",
            program,
            d.submit_options(send_email, queue, &job_name),
            script_name,
            COMMUNICATION_FILE
        );
        (preamble, command)
    }

    /// Exit status from the accounting report, retried while accounting lags
    async fn finished_job_exit_status(&self, job_id: &str) -> Result<String> {
        if job_id == SUBMISSION_FAILED_JOB_ID {
            return Ok(SUBMISSION_FAILED_STATUS.to_string());
        }

        let command = self.dialect.accounting_command(job_id);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let report = self.query(&command).await?;
            if let Some(exit_status) = value_for_key(&report, EXIT_STATUS_KEY) {
                return Ok(exit_status);
            }

            match self.retry_policy.after_failed_attempt(job_id, attempt) {
                RetryDecision::Retry(delay) => {
                    self.console.line(&format!(
                        "{} accounting did not list the finished job. Trying again.",
                        self.dialect.name()
                    ));
                    self.sleeper.sleep(delay).await;
                }
                RetryDecision::GiveUp => break,
            }
        }

        warn!(
            job_id = %job_id,
            scheduler = %self.dialect.name(),
            "Accounting never reported an exit status, assuming success"
        );
        self.console.line(&format!(
            "{} accounting failed to get the exit status for job '{}'. Assuming '{}', \
             which means the job succeeded.",
            self.dialect.name(),
            job_id,
            SUCCEEDED_STATUS
        ));
        Ok(SUCCEEDED_STATUS.to_string())
    }
}

#[async_trait]
impl<D: Dialect> BatchSystem for SchedulerAdapter<D> {
    fn match_mode(&self) -> MatchMode {
        self.dialect.match_mode()
    }

    fn process_status(&self, raw_status: &str) {
        self.console.line(&self.classify(raw_status).narration());
    }

    async fn submit_job(&self, script_name: &str, send_email: bool, queue: &str) -> Result<JobId> {
        let (preamble, command) = self.submit_script(script_name, send_email, queue);
        self.console.line(&format!(
            "Submitting {} job using the command:\n    {}",
            self.dialect.name(),
            command
        ));
        self.run_quiet(&format!("{}{}", preamble, command)).await?;

        let response = self.channel.fetch().await?;
        let mut lines = response.lines();
        let Some(first) = lines.next() else {
            self.console.line(&format!(
                "ERROR: {} job submission failed. There was no diagnostic message.",
                self.dialect.name()
            ));
            warn!(script = %script_name, "Submission produced no output");
            return Ok(SUBMISSION_FAILED_JOB_ID.to_string());
        };

        match parse_submit_ack(first) {
            Some(job_id) => {
                self.console.line(first.trim());
                info!(job_id = %job_id, queue = %queue, script = %script_name, "Job submitted");
                Ok(job_id)
            }
            None => {
                self.console.line(&format!(
                    "ERROR: {} job submission failed because:",
                    self.dialect.name()
                ));
                for line in std::iter::once(first).chain(lines) {
                    self.console.line(&format!("    {}", line.trim()));
                }
                warn!(script = %script_name, "Submission was not acknowledged");
                Ok(SUBMISSION_FAILED_JOB_ID.to_string())
            }
        }
    }

    async fn job_status(&self, job_id: &str) -> Result<String> {
        if job_id == SUBMISSION_FAILED_JOB_ID {
            return Ok(SUBMISSION_FAILED_STATUS.to_string());
        }

        let listing = self.query(&self.dialect.list_command()).await?;
        let status = value_for_key(&listing, job_id).and_then(|row| {
            row.split_whitespace()
                .nth(self.dialect.status_column().saturating_sub(2))
                .map(str::to_string)
        });
        if let Some(status) = status {
            return Ok(status);
        }

        // Absent from the listing: the job left the active queue
        self.console.line(&format!(
            "{} says that the job is no longer running.",
            self.dialect.name()
        ));
        self.finished_job_exit_status(job_id).await
    }

    async fn kill_job(&self, job_id: &str) -> Result<()> {
        info!(job_id = %job_id, scheduler = %self.dialect.name(), "Cancelling job");
        self.run_visible(&format!(
            "#!/bin/bash +x\n{}",
            self.dialect.cancel_command(job_id)
        ))
        .await?;
        Ok(())
    }

    async fn print_error_log(&self) -> Result<()> {
        self.console.line("Job exited with following errors:");
        let log = self.channel.fetch().await?;
        for line in log.lines() {
            self.console.line(line);
        }
        Ok(())
    }

    async fn print_exit_code(&self, job_id: &str) -> Result<()> {
        let exit_status = self.finished_job_exit_status(job_id).await?;
        self.console
            .line(&format!("Exited with exit status {}", exit_status));
        Ok(())
    }

    async fn create_job_progress_file(&self, _job_id: &str, progress_file: &str) -> Result<()> {
        self.run_visible(&format!(
            "#!/bin/bash +x\ncp {} {}",
            self.dialect.output_file(),
            progress_file
        ))
        .await?;
        Ok(())
    }

    async fn running_output_slice(&self, progress_file: &str, slice: LineSlice) -> Result<String> {
        if slice.is_empty() {
            return Ok(String::new());
        }
        self.query(&format!(
            "tail -n +{} {} | head -n {}",
            slice.first_line(),
            progress_file,
            slice.len()
        ))
        .await
    }

    async fn finished_output(&self, _job_id: &str, cursor: ProgressCursor) -> Result<String> {
        self.query(&format!(
            "tail -n +{} {}",
            cursor.lines_streamed() + 1,
            self.dialect.output_file()
        ))
        .await
    }

    async fn clean_up_files(&self, job_id: &str) -> Result<()> {
        debug!(job_id = %job_id, "Removing transient job scripts on host");
        self.run_quiet(&format!("rm -rf {}*-*-*-*-*", JOB_SCRIPT_PREFIX))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::batch::{GridEngine, Lsf};
    use crate::port::mocks::{FakeHost, RecordingConsole, RecordingSleeper};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture<D: Dialect> {
        _dir: TempDir,
        host: Arc<FakeHost>,
        console: Arc<RecordingConsole>,
        sleeper: Arc<RecordingSleeper>,
        adapter: SchedulerAdapter<D>,
    }

    fn fixture<D: Dialect>(dialect: D, host: FakeHost) -> Fixture<D> {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(host);
        let console = Arc::new(RecordingConsole::new());
        let sleeper = Arc::new(RecordingSleeper::new());
        let adapter = SchedulerAdapter::new(
            dialect,
            host.clone(),
            CommunicationChannel::new(host.clone(), dir.path()),
            console.clone(),
            sleeper.clone(),
        );
        Fixture {
            _dir: dir,
            host,
            console,
            sleeper,
            adapter,
        }
    }

    #[test]
    fn test_parse_submit_ack() {
        assert_eq!(
            parse_submit_ack("Your job 42 (\"build\") has been submitted"),
            Some("42".to_string())
        );
        assert_eq!(
            parse_submit_ack("  Your job 7 (\"a/b\") has been submitted \n"),
            Some("7".to_string())
        );
        assert_eq!(parse_submit_ack("Unable to run job: denied"), None);
        assert_eq!(parse_submit_ack("Your job 42 is pending"), None);
    }

    #[tokio::test]
    async fn test_submit_returns_acknowledged_id() {
        let f = fixture(
            GridEngine,
            FakeHost::new().with_rule("qsub", ["Your job 42 (\"build\") has been submitted\n"]),
        );

        let id = f.adapter.submit_job("JOB-abc", false, "all.q").await.unwrap();

        assert_eq!(id, "42");
        let script = &f.host.scripts()[0];
        assert!(script.contains("export BATCHPILOT_JOB_NAME=\"${JOB_NAME:-batchpilot}\""));
        assert!(script.contains("-N ${BATCHPILOT_JOB_NAME//\\//.}"));
        assert!(script.contains("-q all.q"));
        assert!(script.contains(" -m n"));
        assert!(script.contains("JOB-abc  &> output"));
        assert_eq!(f.console.count_containing("has been submitted"), 1);
    }

    #[tokio::test]
    async fn test_submit_failure_returns_sentinel_and_logs_verbatim() {
        let f = fixture(
            GridEngine,
            FakeHost::new().with_rule(
                "qsub",
                ["Unable to run job: queue \"nope\" does not exist.\nExiting.\n"],
            ),
        );

        let id = f.adapter.submit_job("JOB-abc", true, "nope").await.unwrap();

        assert_eq!(id, SUBMISSION_FAILED_JOB_ID);
        let text = f.console.text();
        assert!(text.contains("submission failed because:"));
        assert!(text.contains("    Unable to run job: queue \"nope\" does not exist."));
        assert!(text.contains("    Exiting."));
    }

    #[tokio::test]
    async fn test_submit_without_output_returns_sentinel() {
        let f = fixture(Lsf, FakeHost::new());
        let id = f.adapter.submit_job("JOB-abc", false, "normal").await.unwrap();
        assert_eq!(id, SUBMISSION_FAILED_JOB_ID);
        assert_eq!(f.console.count_containing("no diagnostic message"), 1);
    }

    #[tokio::test]
    async fn test_status_of_sentinel_needs_no_remote_call() {
        let f = fixture(GridEngine, FakeHost::new());
        let status = f.adapter.job_status(SUBMISSION_FAILED_JOB_ID).await.unwrap();
        assert_eq!(status, "J");
        assert!(f.host.scripts().is_empty());
        assert!(f.adapter.job_exited_with_errors(&status));
    }

    #[tokio::test]
    async fn test_status_from_listing_uses_dialect_column() {
        let listing = "job-ID prior   name  user state submit/start at     queue\n\
                       ------------------------------------------------------\n\
                       42     0.555  build ci   Eqw   01/01/2024 10:00:00\n";
        let f = fixture(GridEngine, FakeHost::new().with_rule("qstat", [listing]));
        let status = f.adapter.job_status("42").await.unwrap();
        assert_eq!(status, "Eqw");
        assert!(f.adapter.job_exited_with_errors(&status));

        let f = fixture(Lsf, FakeHost::new().with_rule("bjobs", ["42 user r normal\n"]));
        let status = f.adapter.job_status("42").await.unwrap();
        assert_eq!(status, "r");
        assert!(f.adapter.is_running_status(&status));
        assert_eq!(f.host.count_scripts("bacct"), 0);
    }

    #[tokio::test]
    async fn test_status_falls_back_to_accounting() {
        let f = fixture(
            GridEngine,
            FakeHost::new()
                .with_rule("qstat", ["job-ID prior name\n"])
                .with_rule("qacct", ["qname all.q\nexit_status  3\n"]),
        );

        let status = f.adapter.job_status("42").await.unwrap();

        assert_eq!(status, "3");
        assert!(f.adapter.job_exited_with_errors(&status));
        assert_eq!(f.console.count_containing("no longer running"), 1);
        assert!(f.sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_accounting_lag_is_retried() {
        let f = fixture(
            GridEngine,
            FakeHost::new()
                .with_rule("qstat", [""])
                .with_rule("qacct", ["error: job id 42 not found\n", "", "exit_status 0\n"]),
        );

        let status = f.adapter.job_status("42").await.unwrap();

        assert_eq!(status, "0");
        assert_eq!(f.host.count_scripts("qacct"), 3);
        assert_eq!(f.sleeper.sleeps(), vec![Duration::from_secs(5); 2]);
    }

    #[tokio::test]
    async fn test_accounting_retry_bound_then_optimistic_default() {
        let f = fixture(
            Lsf,
            FakeHost::new()
                .with_rule("bjobs", ["No unfinished job found\n"])
                .with_rule("bacct", ["No matching job found\n"]),
        );

        let status = f.adapter.job_status("42").await.unwrap();

        assert_eq!(status, "0");
        assert!(f.adapter.job_completed_successfully(&status));
        assert_eq!(f.host.count_scripts("bacct"), 10);
        assert_eq!(f.sleeper.sleeps(), vec![Duration::from_secs(5); 9]);
        assert_eq!(f.console.count_containing("Assuming '0'"), 1);
    }

    #[tokio::test]
    async fn test_custom_retry_policy_bounds_attempts() {
        let mut f = fixture(
            GridEngine,
            FakeHost::new()
                .with_rule("qstat", [""])
                .with_rule("qacct", [""]),
        );
        f.adapter = f
            .adapter
            .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(10)));

        let status = f.adapter.job_status("42").await.unwrap();

        assert_eq!(status, "0");
        assert_eq!(f.host.count_scripts("qacct"), 3);
        assert_eq!(f.sleeper.sleeps(), vec![Duration::from_millis(10); 2]);
    }

    #[tokio::test]
    async fn test_exit_code_printed_after_accounting() {
        let f = fixture(
            GridEngine,
            FakeHost::new().with_rule("qacct", ["exit_status 137\n"]),
        );
        f.adapter.print_exit_code("42").await.unwrap();
        assert_eq!(f.console.lines(), vec!["Exited with exit status 137"]);
    }

    #[tokio::test]
    async fn test_process_status_narrates_one_line() {
        let f = fixture(GridEngine, FakeHost::new());
        for token in ["r", "qw", "hqw", "Eqw", "t", "d", "s", "S", "T", "Rr", "w", "J", "0", "9", "?"] {
            f.adapter.process_status(token);
        }
        assert_eq!(f.console.lines().len(), 15);
    }

    #[tokio::test]
    async fn test_kill_issues_cancel_command() {
        let f = fixture(GridEngine, FakeHost::new().with_rule("qdel", ["ci has deleted job 42\n"]));
        f.adapter.kill_job("42").await.unwrap();
        assert!(f.host.scripts()[0].contains("\"$SGE_BIN/qdel\" 42"));
        assert_eq!(f.console.lines(), vec!["ci has deleted job 42"]);
    }

    #[tokio::test]
    async fn test_output_slices() {
        let f = fixture(
            GridEngine,
            FakeHost::new()
                .with_rule("head -n", ["line 4\nline 5\n"])
                .with_rule("tail -n +6 sge.log", ["line 6\n"]),
        );

        let mut cursor = ProgressCursor::new();
        cursor.advance_to(3);
        let slice = cursor.pending_slice(5).unwrap();
        let text = f.adapter.running_output_slice("jobProgress", slice).await.unwrap();
        assert_eq!(text, "line 4\nline 5\n");
        assert!(f.host.scripts()[0].contains("tail -n +4 jobProgress | head -n 2 > output"));

        cursor.advance_to(5);
        let rest = f.adapter.finished_output("42", cursor).await.unwrap();
        assert_eq!(rest, "line 6\n");
    }

    #[tokio::test]
    async fn test_clean_up_removes_job_scripts() {
        let f = fixture(Lsf, FakeHost::new());
        f.adapter.clean_up_files("42").await.unwrap();
        assert_eq!(f.host.scripts(), vec!["rm -rf JOB-*-*-*-*-*"]);
    }
}
