// Staging - input files, job script composition, upload to the host

use super::JobLifecycleOrchestrator;
use crate::application::constants::COMMUNICATION_FILE;
use crate::domain::job::JOB_SCRIPT_PREFIX;
use crate::domain::BuildConfig;
use crate::error::{AppError, Result};
use std::path::PathBuf;
use tracing::{debug, info};

/// Artifacts created while staging a run
#[derive(Debug, Default)]
pub(super) struct StagedJob {
    pub script_name: String,
    pub host_dir: String,
    /// Controller-side files created for this run (script, sent-file copies)
    pub controller_copies: Vec<PathBuf>,
}

/// Single-quote a value for bash
pub(super) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Shell variable holding the job body's exit status while outputs are copied
const BODY_STATUS_VAR: &str = "batchpilot_status";

/// Build the script submitted to the scheduler
///
/// Staged inputs are copied into the job directory first, then the user body
/// runs, then the requested outputs are copied back to the host directory.
/// The script exits with the body's status, not the status of the copies.
pub fn compose_job_script(
    staged_names: &[String],
    job_body: &str,
    files_to_download: &[String],
    host_dir: &str,
) -> String {
    let mut script = String::new();
    for name in staged_names {
        script.push_str(&format!(
            "test -e \"{name}\" || cp \"{host_dir}/{name}\" .\n",
            name = name,
            host_dir = host_dir
        ));
    }
    script.push_str(job_body);
    script.push('\n');
    if files_to_download.is_empty() {
        return script;
    }

    script.push_str(&format!("{}=$?\n", BODY_STATUS_VAR));
    for file in files_to_download {
        // Jobs started with -cwd already run in the host directory
        script.push_str(&format!(
            "[ \"$PWD\" -ef \"{host_dir}\" ] || cp \"{file}\" \"{host_dir}/\" > /dev/null\n",
            file = file,
            host_dir = host_dir
        ));
    }
    script.push_str(&format!("exit ${}\n", BODY_STATUS_VAR));
    script
}

impl JobLifecycleOrchestrator {
    pub(super) async fn stage(&self, config: &BuildConfig, staged: &mut StagedJob) -> Result<()> {
        let controller_dir = self.channel.controller_dir().to_path_buf();
        tokio::fs::create_dir_all(&controller_dir).await?;

        staged.host_dir = self.host_working_directory().await?;
        debug!(host_dir = %staged.host_dir, "Resolved host working directory");

        // Inputs: explicit files are copied next to the uploaded ones first
        let mut to_send = Vec::new();
        let mut staged_names = Vec::new();
        for path in &config.files_to_send {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    AppError::Validation(format!("'{}' has no file name", path.display()))
                })?;
            let copy = controller_dir.join(&name);
            tokio::fs::copy(path, &copy).await?;
            staged.controller_copies.push(copy.clone());
            to_send.push(copy);
            staged_names.push(name);
        }
        for name in &config.uploaded_files {
            to_send.push(controller_dir.join(name));
            staged_names.push(name.clone());
        }
        if !to_send.is_empty() {
            info!(files = ?staged_names, "Sending input files to host");
            self.file_sync.send_to_host(&to_send).await?;
        }

        // Job script under a collision-resistant name
        staged.script_name = format!("{}{}", JOB_SCRIPT_PREFIX, self.id_provider.generate_id());
        let script = compose_job_script(
            &staged_names,
            &config.job_script,
            &config.files_to_download,
            &staged.host_dir,
        );
        let local_script = controller_dir.join(&staged.script_name);
        tokio::fs::write(&local_script, script).await?;
        staged.controller_copies.push(local_script.clone());
        set_executable(&local_script).await?;

        self.file_sync.send_to_host(&[local_script]).await?;
        self.runner
            .run(&format!(
                "#!/bin/bash +x\nchmod 755 {} > /dev/null",
                shell_quote(&staged.script_name)
            ))
            .await?;

        info!(script = %staged.script_name, "Job script staged");
        Ok(())
    }

    async fn host_working_directory(&self) -> Result<String> {
        self.runner
            .run(&format!("pwd > {}", COMMUNICATION_FILE))
            .await?;
        let text = self.channel.fetch().await?;
        text.lines()
            .next()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Internal("could not determine the host working directory".to_string())
            })
    }
}

#[cfg(unix)]
async fn set_executable(path: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
}

#[cfg(not(unix))]
async fn set_executable(_path: &std::path::Path) -> std::io::Result<()> {
    Ok(())
}
