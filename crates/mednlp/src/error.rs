//! Error type for the library facade.

use mednlp_common::MedNlpError;
use mednlp_embed::EmbedError;
use mednlp_ner::NerError;
use mednlp_uts::UtsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LibraryError>;

#[derive(Debug, Error)]
pub enum LibraryError {
    /// A resource was requested that the configuration does not provide.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The cTAKES entry point failed or produced unreadable output.
    #[error("cTAKES error: {0}")]
    CTakes(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Uts(#[from] UtsError),

    #[error(transparent)]
    Ner(#[from] NerError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Common(#[from] MedNlpError),
}
