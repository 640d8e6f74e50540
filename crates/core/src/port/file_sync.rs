// File Sync Port
// Copies named files between the controller and the execution host

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),
}

/// Controller <-> host file transfer
///
/// Transfers are assumed reliable and strictly ordered relative to the
/// remote commands issued immediately before and after them.
#[async_trait]
pub trait FileSync: Send + Sync {
    /// Copy controller-side files into the host working directory
    async fn send_to_host(&self, files: &[PathBuf]) -> Result<(), SyncError>;

    /// Copy files (relative to the host working directory) into `destination`
    async fn fetch_from_host(&self, files: &[String], destination: &Path)
        -> Result<(), SyncError>;
}
