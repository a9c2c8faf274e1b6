//! Error types for the UTS client.

use mednlp_common::MedNlpError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, UtsError>;

#[derive(Debug, Error)]
pub enum UtsError {
    /// The API key was rejected during the ticket exchange.
    #[error("Authentication error using key: {0}")]
    Authentication(String),

    /// UTS reported no matches where the caller required a result.
    #[error("No results: {0}")]
    NoResults(String),

    /// Non-200 status or an `error` field in the response envelope.
    #[error("Could not request {url} (status {status}): {message}")]
    Service {
        status: u16,
        url: String,
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Common(#[from] MedNlpError),
}

impl UtsError {
    pub fn is_no_results(&self) -> bool {
        matches!(self, UtsError::NoResults(_))
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, UtsError::Authentication(_))
    }
}
