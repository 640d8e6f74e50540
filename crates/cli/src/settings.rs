//! Runtime settings
//!
//! Layered, lowest precedence first:
//! 1. built-in defaults (paths under the platform data directory)
//! 2. `batchpilot.toml` in the platform config directory, or the file named
//!    by `--settings`
//! 3. `BATCHPILOT_*` environment variables (`BATCHPILOT_SCHEDULER=lsf`,
//!    `BATCHPILOT_LAUNCHER="ssh build-host bash -s"`, ...)
//!
//! ```toml
//! scheduler = "grid-engine"     # or "lsf"
//! host_dir = "/scratch/ci"      # root of the per-project host directories
//! host_mount = "/mnt/scratch/ci" # same directory as seen from here
//! launcher = ["ssh", "build-host", "bash", "-s"]
//! command_timeout_secs = 600
//! ```

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "batchpilot.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulerKind {
    GridEngine,
    Lsf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// SQLite database holding build configurations and run history
    pub db_path: PathBuf,
    pub scheduler: SchedulerKind,
    /// Execution host directory holding one working directory per project
    pub host_dir: String,
    /// Controller-side path of `host_dir`; defaults to `host_dir`
    pub host_mount: Option<PathBuf>,
    /// Per-project controller directories live under here
    pub controller_root: PathBuf,
    /// Default download destination root
    pub result_root: PathBuf,
    /// Launcher argv; the job scripts are piped to its stdin
    pub launcher: Vec<String>,
    pub command_timeout_secs: Option<u64>,
}

impl Settings {
    /// Load settings from defaults, the config file and the environment
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let dirs = ProjectDirs::from("dev", "batchpilot", "batchpilot");
        let data_dir = dirs
            .as_ref()
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(shellexpand::tilde("~/.batchpilot").into_owned()));
        let config_file = config_file
            .map(Path::to_path_buf)
            .or_else(|| dirs.as_ref().map(|d| d.config_dir().join(CONFIG_FILE_NAME)));

        let mut builder = Config::builder()
            .set_default("db_path", path_default(&data_dir.join("batchpilot.db")))?
            .set_default("scheduler", "grid-engine")?
            .set_default("host_dir", path_default(&data_dir.join("host")))?
            .set_default("controller_root", path_default(&data_dir.join("projects")))?
            .set_default("result_root", path_default(&data_dir.join("results")))?
            .set_default("launcher", vec!["bash", "-s"])?;

        if let Some(path) = &config_file {
            builder = builder.add_source(File::from(path.as_path()).required(false));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("BATCHPILOT")
                    .try_parsing(true)
                    .list_separator(" ")
                    .with_list_parse_key("launcher"),
            )
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;

        Ok(settings.expanded())
    }

    /// Expand `~` and `$VAR` in every path
    fn expanded(mut self) -> Self {
        self.db_path = expand(&self.db_path);
        self.controller_root = expand(&self.controller_root);
        self.result_root = expand(&self.result_root);
        self.host_mount = self.host_mount.as_deref().map(expand);
        self.host_dir = expand_str(&self.host_dir);
        self
    }

    /// Controller-side view of `host_dir`
    pub fn host_mount(&self) -> PathBuf {
        self.host_mount
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.host_dir))
    }

    /// Host working directory of one project
    ///
    /// Runs of different projects never share job scratch files.
    pub fn host_dir_for(&self, project: &str) -> String {
        format!("{}/{}", self.host_dir.trim_end_matches('/'), project)
    }

    /// Controller-side view of [`Settings::host_dir_for`]
    pub fn host_mount_for(&self, project: &str) -> PathBuf {
        self.host_mount().join(project)
    }

    pub fn controller_dir(&self, project: &str) -> PathBuf {
        self.controller_root.join(project)
    }
}

fn path_default(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn expand_str(value: &str) -> String {
    shellexpand::full(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(value).into_owned())
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(expand_str(&path.to_string_lossy()))
}
