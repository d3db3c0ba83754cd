use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Mapped column not found in headers: {0}")]
    MissingColumn(String),
    #[error("Submission failed: {0}")]
    Submission(String),
}

pub type ImportResult<T> = std::result::Result<T, ImportError>;
