// Local file sync
// For execution hosts whose working directory is visible from the controller
// (same machine or a shared filesystem mount).
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use batchpilot_core::port::{FileSync, SyncError};

pub struct LocalFileSync {
    host_dir: PathBuf,
}

impl LocalFileSync {
    /// # Arguments
    /// * `host_dir` - Controller-side path of the host working directory
    pub fn new(host_dir: impl Into<PathBuf>) -> Self {
        Self {
            host_dir: host_dir.into(),
        }
    }

    pub fn host_dir(&self) -> &Path {
        &self.host_dir
    }
}

async fn copy_file(from: &Path, to: &Path) -> Result<(), SyncError> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::Transfer(format!("{}: {}", parent.display(), e)))?;
    }
    match tokio::fs::copy(from, to).await {
        Ok(bytes) => {
            debug!(from = %from.display(), to = %to.display(), bytes = bytes, "Copied file");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(SyncError::NotFound(from.display().to_string()))
        }
        Err(e) => Err(SyncError::Transfer(format!(
            "{} -> {}: {}",
            from.display(),
            to.display(),
            e
        ))),
    }
}

/// Reject names that would escape the directory they are resolved against
fn relative_name(name: &str) -> Result<&Path, SyncError> {
    let path = Path::new(name);
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir));
    if name.trim().is_empty() || escapes {
        return Err(SyncError::Transfer(format!(
            "'{}' is not a path inside the host working directory",
            name
        )));
    }
    Ok(path)
}

#[async_trait]
impl FileSync for LocalFileSync {
    async fn send_to_host(&self, files: &[PathBuf]) -> Result<(), SyncError> {
        for file in files {
            let name = file.file_name().ok_or_else(|| {
                SyncError::Transfer(format!("'{}' has no file name", file.display()))
            })?;
            copy_file(file, &self.host_dir.join(name)).await?;
        }
        Ok(())
    }

    async fn fetch_from_host(
        &self,
        files: &[String],
        destination: &Path,
    ) -> Result<(), SyncError> {
        for name in files {
            let relative = relative_name(name)?;
            copy_file(&self.host_dir.join(relative), &destination.join(relative)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_between_dirs() {
        let host = tempfile::tempdir().unwrap();
        let controller = tempfile::tempdir().unwrap();
        let sync = LocalFileSync::new(host.path());

        let input = controller.path().join("input.csv");
        std::fs::write(&input, "a,b\n").unwrap();
        sync.send_to_host(&[input]).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(host.path().join("input.csv")).unwrap(),
            "a,b\n"
        );

        std::fs::create_dir(host.path().join("logs")).unwrap();
        std::fs::write(host.path().join("logs/run.log"), "ok\n").unwrap();
        let results = controller.path().join("results");
        sync.fetch_from_host(&["logs/run.log".to_string()], &results)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(results.join("logs/run.log")).unwrap(),
            "ok\n"
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let host = tempfile::tempdir().unwrap();
        let controller = tempfile::tempdir().unwrap();
        let sync = LocalFileSync::new(host.path());

        let result = sync
            .fetch_from_host(&["output".to_string()], controller.path())
            .await;
        assert!(matches!(result, Err(SyncError::NotFound(_))));

        let result = sync
            .send_to_host(&[controller.path().join("absent.txt")])
            .await;
        assert!(matches!(result, Err(SyncError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_escaping_names_rejected() {
        let host = tempfile::tempdir().unwrap();
        let sync = LocalFileSync::new(host.path());

        for name in ["../secret", "/etc/passwd", ""] {
            let result = sync
                .fetch_from_host(&[name.to_string()], host.path())
                .await;
            assert!(matches!(result, Err(SyncError::Transfer(_))), "{}", name);
        }
    }
}
