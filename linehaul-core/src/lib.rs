pub mod notify;
pub mod sequence;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("External collaborator failed: {0}")]
    External(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
