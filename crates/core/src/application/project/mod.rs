// Project Service - per-project build configuration and run bookkeeping

pub mod runs;

use crate::domain::{BuildConfig, DomainError};
use crate::error::{AppError, Result};
use crate::port::{BuildConfigStore, IdProvider, RunHistory, TimeProvider};
use std::sync::Arc;
use tracing::info;

pub struct ProjectService {
    store: Arc<dyn BuildConfigStore>,
    history: Arc<dyn RunHistory>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl ProjectService {
    pub fn new(
        store: Arc<dyn BuildConfigStore>,
        history: Arc<dyn RunHistory>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            history,
            id_provider,
            time_provider,
        }
    }

    /// Store a project's configuration
    ///
    /// The uploaded-files list is owned by `register_upload`/`remove_upload`
    /// and survives reconfiguration.
    pub async fn configure(&self, mut config: BuildConfig) -> Result<BuildConfig> {
        if let Some(existing) = self.store.load(&config.project).await? {
            config.uploaded_files = existing.uploaded_files;
        }
        config.validate()?;
        self.store.save(&config).await?;
        info!(project = %config.project, queue = %config.queue, "Project configured");
        Ok(config)
    }

    pub async fn get(&self, project: &str) -> Result<BuildConfig> {
        self.store
            .load(project)
            .await?
            .ok_or_else(|| DomainError::ProjectNotConfigured(project.to_string()).into())
    }

    pub async fn list_projects(&self) -> Result<Vec<String>> {
        self.store.list_projects().await
    }

    /// Register a file uploaded into the project's controller directory
    pub async fn register_upload(&self, project: &str, file_name: &str) -> Result<()> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(AppError::Validation("Upload name cannot be empty".to_string()));
        }
        let mut config = self.get(project).await?;
        config.add_uploaded_file(file_name);
        config.validate()?;
        self.store.save(&config).await?;
        info!(project = %project, file = %file_name, "Upload registered");
        Ok(())
    }

    /// Forget an uploaded file; returns false if it was not registered
    pub async fn remove_upload(&self, project: &str, file_name: &str) -> Result<bool> {
        let mut config = self.get(project).await?;
        if !config.remove_uploaded_file(file_name.trim()) {
            return Ok(false);
        }
        self.store.save(&config).await?;
        info!(project = %project, file = %file_name, "Upload removed");
        Ok(true)
    }
}
