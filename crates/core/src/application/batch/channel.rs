// Communication Channel
//
// Remote commands redirect their text result into COMMUNICATION_FILE on the
// host; `fetch` copies it back and reads it. Only meaningful right after the
// paired command completed, the next round overwrites it.

use crate::application::constants::COMMUNICATION_FILE;
use crate::error::Result;
use crate::port::{FileSync, SyncError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct CommunicationChannel {
    file_sync: Arc<dyn FileSync>,
    controller_dir: PathBuf,
}

impl CommunicationChannel {
    /// # Arguments
    /// * `file_sync` - Transfer used to copy the file back
    /// * `controller_dir` - Controller directory receiving the copy
    pub fn new(file_sync: Arc<dyn FileSync>, controller_dir: impl Into<PathBuf>) -> Self {
        Self {
            file_sync,
            controller_dir: controller_dir.into(),
        }
    }

    /// Transfer shared with file staging
    pub fn file_sync(&self) -> Arc<dyn FileSync> {
        Arc::clone(&self.file_sync)
    }

    pub fn controller_dir(&self) -> &Path {
        &self.controller_dir
    }

    /// Controller-side path of the copied file
    pub fn local_path(&self) -> PathBuf {
        self.controller_dir.join(COMMUNICATION_FILE)
    }

    /// Copy the file back and return its text (lossy UTF-8)
    ///
    /// A file that never got created on the host reads as empty.
    pub async fn fetch(&self) -> Result<String> {
        match self
            .file_sync
            .fetch_from_host(&[COMMUNICATION_FILE.to_string()], &self.controller_dir)
            .await
        {
            Ok(()) => {}
            Err(SyncError::NotFound(_)) => return Ok(String::new()),
            Err(e) => return Err(e.into()),
        }

        match tokio::fs::read(self.local_path()).await {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the controller-side copy; a missing file is not an error
    pub async fn remove_local(&self) -> std::io::Result<()> {
        match tokio::fs::remove_file(self.local_path()).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
