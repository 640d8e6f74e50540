// SQLite BuildConfigStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use batchpilot_core::domain::BuildConfig;
use batchpilot_core::error::{AppError, Result};
use batchpilot_core::port::{BuildConfigStore, TimeProvider};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub struct SqliteBuildConfigStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteBuildConfigStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl BuildConfigStore for SqliteBuildConfigStore {
    async fn load(&self, project: &str) -> Result<Option<BuildConfig>> {
        let row = sqlx::query_as::<_, BuildConfigRow>(
            r#"
            SELECT project, job_script, files_to_download, files_to_send, uploaded_files,
                   download_destination, poll_interval_minutes, send_email, queue
            FROM build_configs WHERE project = ?
            "#,
        )
        .bind(project)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(BuildConfigRow::into_config).transpose()
    }

    async fn save(&self, config: &BuildConfig) -> Result<()> {
        let files_to_send: Vec<String> = config
            .files_to_send
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let download_destination = config
            .download_destination
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());

        sqlx::query(
            r#"
            INSERT INTO build_configs (
                project, job_script, files_to_download, files_to_send, uploaded_files,
                download_destination, poll_interval_minutes, send_email, queue, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project) DO UPDATE SET
                job_script = excluded.job_script,
                files_to_download = excluded.files_to_download,
                files_to_send = excluded.files_to_send,
                uploaded_files = excluded.uploaded_files,
                download_destination = excluded.download_destination,
                poll_interval_minutes = excluded.poll_interval_minutes,
                send_email = excluded.send_email,
                queue = excluded.queue,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&config.project)
        .bind(&config.job_script)
        .bind(serde_json::to_string(&config.files_to_download)?)
        .bind(serde_json::to_string(&files_to_send)?)
        .bind(serde_json::to_string(&config.uploaded_files)?)
        .bind(download_destination)
        .bind(config.poll_interval_minutes)
        .bind(if config.send_email { 1 } else { 0 })
        .bind(&config.queue)
        .bind(self.time_provider.now_millis())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(project = %config.project, "Build configuration saved");
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT project FROM build_configs ORDER BY project")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct BuildConfigRow {
    project: String,
    job_script: String,
    files_to_download: String,
    files_to_send: String,
    uploaded_files: String,
    download_destination: Option<String>,
    poll_interval_minutes: f64,
    send_email: i32, // SQLite boolean as integer
    queue: String,
}

impl BuildConfigRow {
    fn into_config(self) -> Result<BuildConfig> {
        let list = |column: &str, raw: &str| -> Result<Vec<String>> {
            serde_json::from_str(raw).map_err(|e| {
                AppError::Database(format!(
                    "Corrupt {} for project '{}': {}",
                    column, self.project, e
                ))
            })
        };
        let files_to_download = list("files_to_download", &self.files_to_download)?;
        let files_to_send = list("files_to_send", &self.files_to_send)?;
        let uploaded_files = list("uploaded_files", &self.uploaded_files)?;

        Ok(BuildConfig {
            files_to_download,
            files_to_send: files_to_send.into_iter().map(PathBuf::from).collect(),
            uploaded_files,
            download_destination: self.download_destination.map(PathBuf::from),
            poll_interval_minutes: self.poll_interval_minutes,
            send_email: self.send_email != 0,
            project: self.project,
            job_script: self.job_script,
            queue: self.queue,
        })
    }
}
