// SQLite RunHistory Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use batchpilot_core::domain::RunRecord;
use batchpilot_core::error::Result;
use batchpilot_core::port::RunHistory;
use sqlx::SqlitePool;

pub struct SqliteRunHistory {
    pool: SqlitePool,
}

impl SqliteRunHistory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunHistory for SqliteRunHistory {
    async fn record(&self, run: &RunRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO runs (id, project, job_id, final_status, succeeded, started_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(&run.project)
        .bind(&run.job_id)
        .bind(&run.final_status)
        .bind(if run.succeeded { 1 } else { 0 })
        .bind(run.started_at)
        .bind(run.finished_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn recent(&self, project: &str, limit: u32) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, project, job_id, final_status, succeeded, started_at, finished_at
            FROM runs
            WHERE project = ?
            ORDER BY finished_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(project)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(RunRow::into_record).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RunRow {
    id: String,
    project: String,
    job_id: String,
    final_status: String,
    succeeded: i32,
    started_at: i64,
    finished_at: i64,
}

impl RunRow {
    fn into_record(self) -> RunRecord {
        RunRecord {
            id: self.id,
            project: self.project,
            job_id: self.job_id,
            final_status: self.final_status,
            succeeded: self.succeeded != 0,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}
