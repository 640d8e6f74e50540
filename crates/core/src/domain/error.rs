// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Project not configured: {0}")]
    ProjectNotConfigured(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
