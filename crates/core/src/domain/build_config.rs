// Build Configuration - everything one orchestrated run needs to know
//
// Persisted per project by the configuration store. The uploaded-files list
// lives here instead of in any process-wide registry.

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project name (also the controller-side directory name)
pub type ProjectName = String;

const MAX_PROJECT_NAME_LEN: usize = 128;

/// Split a comma-separated file list, trimming entries and dropping empties
pub fn split_file_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    pub project: ProjectName,
    /// User job body, appended after the staging commands
    pub job_script: String,
    /// Host-side files copied back to the controller after the job
    pub files_to_download: Vec<String>,
    /// Controller directory for downloads; `None` means the run's result directory
    pub download_destination: Option<PathBuf>,
    /// Controller-side files staged to the host before submission
    pub files_to_send: Vec<PathBuf>,
    /// Files already uploaded into the project's controller directory
    #[serde(default)]
    pub uploaded_files: Vec<String>,
    pub poll_interval_minutes: f64,
    pub send_email: bool,
    pub queue: String,
}

impl BuildConfig {
    /// Create a configuration with defaults for everything but the job body
    pub fn new(
        project: impl Into<String>,
        job_script: impl Into<String>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            job_script: job_script.into(),
            files_to_download: Vec::new(),
            download_destination: None,
            files_to_send: Vec::new(),
            uploaded_files: Vec::new(),
            poll_interval_minutes: 1.0,
            send_email: false,
            queue: queue.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_project_name(&self.project)?;

        if self.queue.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Queue name cannot be empty".to_string(),
            ));
        }
        if !self.queue.chars().all(is_queue_char) {
            return Err(DomainError::ValidationError(format!(
                "Queue name '{}' must be alphanumeric with '.', '_', '-' or '@'",
                self.queue
            )));
        }

        if !self.poll_interval_minutes.is_finite() || self.poll_interval_minutes < 0.0 {
            return Err(DomainError::ValidationError(format!(
                "Poll interval must be a non-negative number of minutes, got {}",
                self.poll_interval_minutes
            )));
        }

        for uploaded in &self.uploaded_files {
            if uploaded.contains('/') || uploaded.contains(',') {
                return Err(DomainError::ValidationError(format!(
                    "Uploaded file '{}' must be a bare file name",
                    uploaded
                )));
            }
        }

        for path in &self.files_to_send {
            if base_name(path).is_none() {
                return Err(DomainError::ValidationError(format!(
                    "File to send '{}' has no file name",
                    path.display()
                )));
            }
        }

        Ok(())
    }

    /// Base names of the files to send, as they appear on the host
    pub fn sent_file_names(&self) -> Vec<String> {
        self.files_to_send
            .iter()
            .filter_map(|p| base_name(p))
            .collect()
    }

    /// Register a file uploaded into the project directory (idempotent)
    pub fn add_uploaded_file(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.uploaded_files.contains(&name) {
            self.uploaded_files.push(name);
        }
    }

    /// Forget an uploaded file; returns true if it was registered
    pub fn remove_uploaded_file(&mut self, name: &str) -> bool {
        let before = self.uploaded_files.len();
        self.uploaded_files.retain(|f| f != name);
        self.uploaded_files.len() != before
    }
}

/// Queue names reach the submit command line unquoted
fn is_queue_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@')
}

fn base_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn validate_project_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DomainError::ValidationError(
            "Project name cannot be empty".to_string(),
        ));
    }
    if name.len() > MAX_PROJECT_NAME_LEN {
        return Err(DomainError::ValidationError(format!(
            "Project name too long (max {} chars)",
            MAX_PROJECT_NAME_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
        || name.starts_with('.')
    {
        return Err(DomainError::ValidationError(
            "Project name must be alphanumeric with '_', '-' or '.'".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_file_list() {
        assert_eq!(
            split_file_list(" a.txt, out/b.log ,,c "),
            vec!["a.txt", "out/b.log", "c"]
        );
        assert!(split_file_list("").is_empty());
        assert!(split_file_list(" , ").is_empty());
    }

    #[test]
    fn test_validate_valid_config() {
        let mut config = BuildConfig::new("nightly-build", "make test", "all.q");
        config.files_to_send = vec![PathBuf::from("/data/input.csv")];
        config.poll_interval_minutes = 0.25;
        assert!(config.validate().is_ok());
        assert_eq!(config.sent_file_names(), vec!["input.csv"]);
    }

    #[test]
    fn test_validate_project_name() {
        let config = BuildConfig::new("", "make", "all.q");
        assert!(config.validate().unwrap_err().to_string().contains("empty"));

        let config = BuildConfig::new("a".repeat(129), "make", "all.q");
        assert!(config.validate().unwrap_err().to_string().contains("too long"));

        let config = BuildConfig::new("../etc", "make", "all.q");
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("alphanumeric"));
    }

    #[test]
    fn test_validate_poll_interval() {
        let mut config = BuildConfig::new("p", "make", "all.q");
        config.poll_interval_minutes = -1.0;
        assert!(config.validate().is_err());
        config.poll_interval_minutes = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_queue() {
        let config = BuildConfig::new("p", "make", " ");
        assert!(config.validate().is_err());
        let config = BuildConfig::new("p", "make", "all.q; rm -rf");
        assert!(config.validate().is_err());

        for queue in ["a;b", "$(id)", "`id`", "q|x", "all.q>out"] {
            let config = BuildConfig::new("p", "make", queue);
            assert!(config.validate().is_err(), "queue {queue} accepted");
        }
        for queue in ["all.q", "long_q", "gpu-a100", "all.q@node01"] {
            assert!(BuildConfig::new("p", "make", queue).validate().is_ok());
        }
    }

    #[test]
    fn test_uploaded_file_registry() {
        let mut config = BuildConfig::new("p", "make", "all.q");
        config.add_uploaded_file("data.bin");
        config.add_uploaded_file("data.bin");
        assert_eq!(config.uploaded_files, vec!["data.bin"]);
        assert!(config.remove_uploaded_file("data.bin"));
        assert!(!config.remove_uploaded_file("data.bin"));

        config.uploaded_files.push("sub/dir".to_string());
        assert!(config.validate().is_err());
    }
}
