//! Error types for the embedding model.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbedError>;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A value in the embedding file is not a number. `line` counts data rows
    /// from 1, not including the header.
    #[error("Could not parse line {line} (word: {cui}): {message}")]
    Parse {
        line: usize,
        cui: String,
        message: String,
    },

    #[error("Dimension mismatch at line {line}: expected {expected}, got {actual}")]
    Dimension {
        line: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown CUI: {0}")]
    UnknownCui(String),
}
