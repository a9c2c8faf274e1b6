//! Configuration for the cui2vec model.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Location and shape of the cui2vec embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cui2VecConfig {
    /// Path to the cui2vec CSV file
    pub path: PathBuf,

    /// Vector dimension (default: 500)
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_dimension() -> usize {
    500
}

impl Cui2VecConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            dimension: default_dimension(),
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}
