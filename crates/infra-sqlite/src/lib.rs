// Batchpilot Infrastructure - SQLite Adapter
// Implements: BuildConfigStore, RunHistory

mod config_store;
mod connection;
mod error;
mod migration;
mod run_history;

pub use config_store::SqliteBuildConfigStore;
pub use connection::create_pool;
pub use migration::run_migrations;
pub use run_history::SqliteRunHistory;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)

#[cfg(test)]
pub(crate) async fn test_pool() -> (tempfile::TempDir, sqlx::SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = create_pool(&dir.path().join("batchpilot.db")).await.unwrap();
    run_migrations(&pool).await.unwrap();
    (dir, pool)
}
