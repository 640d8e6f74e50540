// Configuration Storage Ports
// Per-project build configuration and run history

use crate::domain::{BuildConfig, RunRecord};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait BuildConfigStore: Send + Sync {
    /// Load the configuration for a project
    async fn load(&self, project: &str) -> Result<Option<BuildConfig>>;

    /// Insert or replace the configuration for `config.project`
    async fn save(&self, config: &BuildConfig) -> Result<()>;

    /// All configured project names, sorted
    async fn list_projects(&self) -> Result<Vec<String>>;
}

#[async_trait]
pub trait RunHistory: Send + Sync {
    async fn record(&self, run: &RunRecord) -> Result<()>;

    /// Most recent runs first
    async fn recent(&self, project: &str, limit: u32) -> Result<Vec<RunRecord>>;
}
