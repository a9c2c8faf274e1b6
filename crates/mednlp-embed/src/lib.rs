//! Pretrained cui2vec concept embeddings.
//!
//! cui2vec (Beam et al.) embeds about 109k UMLS concepts in 500 dimensions.
//! The model is distributed as a CSV file whose first column is the CUI.

pub mod config;
pub mod cui2vec;
pub mod error;

pub use config::Cui2VecConfig;
pub use cui2vec::Cui2VecModel;
pub use error::{EmbedError, Result};
