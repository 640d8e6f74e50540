// Shell command runner
// reason: async-trait, tokio for async process management
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use batchpilot_core::port::{CommandOutput, RemoteCommandRunner, RemoteError};

/// Launcher environment passed through by default
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "LOGNAME",
    "SHELL",
    "LANG",
    "SSH_AUTH_SOCK",
    "SGE_BIN",
    "SGE_ROOT",
    "SGE_CELL",
    "LSF_BIN",
    "LSF_ENVDIR",
    "LSF_SERVERDIR",
];

/// Runs scripts by piping them into a launcher process
///
/// The launcher reads the script from stdin: `bash -s` for a host that
/// shares the controller's machine, `ssh build-host bash -s` for a remote
/// one. Every script starts in the host working directory, created on
/// first use.
pub struct ShellCommandRunner {
    program: String,
    args: Vec<String>,
    host_dir: String,
    env_allowlist: Vec<String>,
    exports: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl ShellCommandRunner {
    /// Create a new runner
    ///
    /// # Arguments
    /// * `launcher` - Launcher argv, e.g. `["ssh", "build-host", "bash", "-s"]`
    /// * `host_dir` - Working directory on the execution host
    ///
    /// # Example
    /// ```ignore
    /// let runner = ShellCommandRunner::new(
    ///     vec!["bash".to_string(), "-s".to_string()],
    ///     "/scratch/ci",
    /// )?
    /// .with_export("JOB_NAME", "nightly");
    /// ```
    pub fn new(launcher: Vec<String>, host_dir: impl Into<String>) -> Result<Self, RemoteError> {
        let mut launcher = launcher.into_iter();
        let program = launcher
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| RemoteError::SpawnFailed("Launcher command is empty".to_string()))?;

        Ok(Self {
            program,
            args: launcher.collect(),
            host_dir: host_dir.into(),
            env_allowlist: DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect(),
            exports: Vec::new(),
            timeout: None,
        })
    }

    /// Replace the launcher environment allowlist
    pub fn with_env_allowlist(mut self, env_allowlist: Vec<String>) -> Self {
        self.env_allowlist = env_allowlist;
        self
    }

    /// Export a variable at the top of every script
    ///
    /// Unlike the launcher environment this reaches the host through `ssh`.
    pub fn with_export(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.exports.push((key.into(), value.into()));
        self
    }

    /// Fail commands that run longer than `limit`
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Filter environment variables to allowlist only
    fn filter_env(&self, env: &HashMap<String, String>) -> HashMap<String, String> {
        env.iter()
            .filter(|(k, _)| self.env_allowlist.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Script actually delivered to the launcher
    fn wrap_script(&self, script: &str) -> String {
        let dir = quote(&self.host_dir);
        let mut wrapped = format!("mkdir -p {dir} && cd {dir} || exit 1\n");
        for (key, value) in &self.exports {
            wrapped.push_str(&format!("export {}={}\n", key, quote(value)));
        }
        wrapped.push_str(script);
        if !script.ends_with('\n') {
            wrapped.push('\n');
        }
        wrapped
    }

    async fn spawn_and_wait(&self, script: &str) -> Result<std::process::Output, RemoteError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        let filtered_env = self.filter_env(&env);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env_clear()
            .envs(&filtered_env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RemoteError::SpawnFailed(format!("{}: {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RemoteError::IoError("Launcher stdin unavailable".to_string()))?;
        // A launcher that exits early (failed `cd`) closes its stdin; its exit
        // status is what the caller needs, not the write error
        if let Err(e) = stdin.write_all(script.as_bytes()).await {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(RemoteError::IoError(e.to_string()));
            }
        }
        drop(stdin);

        match self.timeout {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(e)) => Err(RemoteError::IoError(e.to_string())),
                Err(_) => Err(RemoteError::Timeout(limit.as_millis() as u64)),
            },
            None => child
                .wait_with_output()
                .await
                .map_err(|e| RemoteError::IoError(e.to_string())),
        }
    }
}

#[async_trait]
impl RemoteCommandRunner for ShellCommandRunner {
    async fn run(&self, script: &str) -> Result<CommandOutput, RemoteError> {
        let start = Instant::now();
        debug!(
            launcher = %self.program,
            host_dir = %self.host_dir,
            script = %script,
            "Running remote script"
        );

        let output = self.spawn_and_wait(&self.wrap_script(script)).await?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        info!(
            launcher = %self.program,
            duration_ms = %start.elapsed().as_millis(),
            exit_code = ?result.exit_code,
            "Remote script completed"
        );
        Ok(result)
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_runner(dir: &std::path::Path) -> ShellCommandRunner {
        ShellCommandRunner::new(
            vec!["bash".to_string(), "-s".to_string()],
            dir.to_string_lossy(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_runs_in_host_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = local_runner(dir.path());

        let output = runner.run("#!/bin/bash +x\npwd > output").await.unwrap();

        assert!(output.success());
        let written = std::fs::read_to_string(dir.path().join("output")).unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(
            std::path::Path::new(written.trim()).canonicalize().unwrap(),
            expected
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let runner = local_runner(dir.path());

        let output = runner.run("echo oops >&2\nexit 3").await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.lines().collect::<Vec<_>>(), vec!["oops"]);
    }

    #[tokio::test]
    async fn test_exports_reach_script() {
        let dir = tempfile::tempdir().unwrap();
        let runner = local_runner(dir.path()).with_export("JOB_NAME", "it's/ci");

        let output = runner.run("echo \"$JOB_NAME\"").await.unwrap();

        assert_eq!(output.stdout, "it's/ci\n");
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let runner = local_runner(dir.path()).with_timeout(Duration::from_millis(100));

        let result = runner.run("sleep 10").await;

        assert!(matches!(result, Err(RemoteError::Timeout(100))));
    }

    #[tokio::test]
    async fn test_missing_host_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let project_dir = dir.path().join("nightly");
        let runner = local_runner(&project_dir);

        let output = runner.run("touch marker").await.unwrap();

        assert!(output.success());
        assert!(project_dir.join("marker").exists());
    }

    #[tokio::test]
    async fn test_unusable_host_dir_fails_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file"), "").unwrap();
        let runner = local_runner(&dir.path().join("file").join("nightly"));

        let output = runner.run("echo unreachable").await.unwrap();

        assert_eq!(output.exit_code, Some(1));
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_empty_launcher_rejected() {
        assert!(matches!(
            ShellCommandRunner::new(vec![], "/tmp"),
            Err(RemoteError::SpawnFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_launcher_fails_to_spawn() {
        let runner =
            ShellCommandRunner::new(vec!["/nonexistent/launcher".to_string()], "/tmp").unwrap();
        assert!(matches!(
            runner.run("true").await,
            Err(RemoteError::SpawnFailed(_))
        ));
    }

    #[test]
    fn test_env_filtering() {
        let runner = ShellCommandRunner::new(vec!["bash".to_string()], "/tmp")
            .unwrap()
            .with_env_allowlist(vec!["ALLOWED_VAR".to_string()]);

        let mut env = HashMap::new();
        env.insert("ALLOWED_VAR".to_string(), "value1".to_string());
        env.insert("BLOCKED_VAR".to_string(), "value2".to_string());

        let filtered = runner.filter_env(&env);

        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("ALLOWED_VAR"));
        assert!(!filtered.contains_key("BLOCKED_VAR"));
    }
}
