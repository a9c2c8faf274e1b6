use thiserror::Error;

#[derive(Debug, Error)]
pub enum MedNlpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stash error: {0}")]
    Stash(String),
}

pub type Result<T> = std::result::Result<T, MedNlpError>;
