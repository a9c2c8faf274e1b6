//! Medical concept features for tokenized text.
//!
//! A [`MedicalDocumentParser`] tokenizes text, finds concept mentions with an
//! [`EntityRecognizer`], and reconciles the mention spans onto the tokens. The
//! result is a [`MedicalDocument`] of [`MedicalFeatureToken`]s, each of which
//! can answer whether it is part of a UMLS concept and, if so, expose the
//! concept's names, semantic types and definition from a [`ConceptDatabase`].

pub mod concept_db;
pub mod parser;
pub mod recognizer;
pub mod reconcile;
pub mod token;
pub mod tokenizer;
pub mod tui;

pub use concept_db::{ConceptDatabase, ConceptRecord, InMemoryConceptDb};
pub use parser::{MedicalDocument, MedicalDocumentParser, MedicalDocumentParserBuilder};
pub use recognizer::{DictionaryRecognizer, EntityRecognizer};
pub use reconcile::{reconcile, EntitySpan, Reconciliation};
pub use token::{
    numeric_cui, ConceptMention, FeatureId, FeatureValue, MedicalFeatureToken, Token,
    TokenFeatures,
};
pub use tokenizer::{RegexTokenizer, Tokenizer};
pub use tui::{SemanticGroup, TuiCatalog};

pub type Result<T> = std::result::Result<T, NerError>;

#[derive(Debug, thiserror::Error)]
pub enum NerError {
    /// Required collaborator or setting missing.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A concept identifier without a letter prefix and numeric body.
    #[error("Malformed CUI: {0}")]
    MalformedCui(String),

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    /// A resource file line that does not have the expected fields.
    #[error("Format error at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("Pattern error: {0}")]
    Pattern(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<regex::Error> for NerError {
    fn from(e: regex::Error) -> Self {
        NerError::Pattern(e.to_string())
    }
}

impl From<aho_corasick::BuildError> for NerError {
    fn from(e: aho_corasick::BuildError) -> Self {
        NerError::Pattern(e.to_string())
    }
}
