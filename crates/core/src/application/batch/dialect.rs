// Scheduler Dialects
//
// Everything that differs between supported batch schedulers: command text,
// the job-name variable rescued before submission, the status column of the
// listing, and how status tokens are matched. The algorithm lives in
// `SchedulerAdapter` and is shared verbatim.

use crate::domain::MatchMode;

pub trait Dialect: Send + Sync {
    /// Short name used in logs and console messages
    fn name(&self) -> &'static str;

    /// Environment variable pointing at the scheduler's bin directory
    fn bin_var(&self) -> &'static str;

    fn submit_program(&self) -> &'static str;

    /// Private variable that keeps the controller's `JOB_NAME`, which the
    /// scheduler overwrites inside the job environment
    fn rescued_job_name_var(&self) -> &'static str;

    /// Scheduler-side file collecting the job's stdout and stderr
    fn output_file(&self) -> &'static str;

    /// Submit options placed between the program and the script name
    fn submit_options(&self, send_email: bool, queue: &str, job_name: &str) -> String;

    /// "List my jobs" command
    fn list_command(&self) -> String;

    /// 1-based column of the status in a listing row (column 1 is the job id)
    fn status_column(&self) -> usize;

    /// Finished-job accounting query
    fn accounting_command(&self, job_id: &str) -> String;

    fn cancel_command(&self, job_id: &str) -> String;

    fn match_mode(&self) -> MatchMode;

    /// Quoted path of a scheduler program
    fn program(&self, name: &str) -> String {
        format!("\"${}/{}\"", self.bin_var(), name)
    }
}

/// Grid Engine (`qsub`/`qstat`/`qacct`/`qdel`)
///
/// Status tokens carry modifier suffixes (`Eqw`, `hqw`, `Rr`), so they are
/// matched by prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridEngine;

impl Dialect for GridEngine {
    fn name(&self) -> &'static str {
        "Grid Engine"
    }

    fn bin_var(&self) -> &'static str {
        "SGE_BIN"
    }

    fn submit_program(&self) -> &'static str {
        "qsub"
    }

    fn rescued_job_name_var(&self) -> &'static str {
        "BATCHPILOT_JOB_NAME"
    }

    fn output_file(&self) -> &'static str {
        "sge.log"
    }

    fn submit_options(&self, send_email: bool, queue: &str, job_name: &str) -> String {
        let email = if send_email { "" } else { " -m n" };
        format!(
            "{} -S /bin/bash -q {} -N {} -cwd -V -o {} -j yes",
            email,
            queue,
            job_name,
            self.output_file()
        )
    }

    fn list_command(&self) -> String {
        format!("{} -u $USER", self.program("qstat"))
    }

    fn status_column(&self) -> usize {
        // job-ID prior name user state ...
        5
    }

    fn accounting_command(&self, job_id: &str) -> String {
        format!("{} -j {}", self.program("qacct"), job_id)
    }

    fn cancel_command(&self, job_id: &str) -> String {
        format!("{} {}", self.program("qdel"), job_id)
    }

    fn match_mode(&self) -> MatchMode {
        MatchMode::Prefix
    }
}

/// LSF (`bsub`/`bjobs`/`bacct`/`bkill`), single-letter tokens matched exactly
#[derive(Debug, Clone, Copy, Default)]
pub struct Lsf;

impl Dialect for Lsf {
    fn name(&self) -> &'static str {
        "LSF"
    }

    fn bin_var(&self) -> &'static str {
        "LSF_BIN"
    }

    fn submit_program(&self) -> &'static str {
        "bsub"
    }

    fn rescued_job_name_var(&self) -> &'static str {
        "BATCHPILOT_LSF_JOB_NAME"
    }

    fn output_file(&self) -> &'static str {
        "lsf.log"
    }

    fn submit_options(&self, send_email: bool, queue: &str, job_name: &str) -> String {
        let email = if send_email { " -N" } else { "" };
        format!(
            "{} -q {} -J {} -cwd \"$PWD\" -o {}",
            email,
            queue,
            job_name,
            self.output_file()
        )
    }

    fn list_command(&self) -> String {
        format!("{} -u $USER", self.program("bjobs"))
    }

    fn status_column(&self) -> usize {
        // JOBID USER STAT ...
        3
    }

    fn accounting_command(&self, job_id: &str) -> String {
        format!("{} -l {}", self.program("bacct"), job_id)
    }

    fn cancel_command(&self, job_id: &str) -> String {
        format!("{} {}", self.program("bkill"), job_id)
    }

    fn match_mode(&self) -> MatchMode {
        MatchMode::Exact
    }
}
