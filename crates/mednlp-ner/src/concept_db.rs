//! Concept reference data keyed by CUI.

use std::fs;
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::Result;

/// A UMLS concept as known to the local concept database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRecord {
    /// Concept unique identifier, e.g. `C0035078`.
    pub cui: String,
    pub pref_name: String,
    /// Semantic type identifiers (TUIs), e.g. `T047`.
    #[serde(default)]
    pub type_ids: Vec<String>,
    /// Synonyms, including the preferred name.
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub definition: Option<String>,
}

impl ConceptRecord {
    pub fn new(cui: impl Into<String>, pref_name: impl Into<String>) -> Self {
        Self {
            cui: cui.into(),
            pref_name: pref_name.into(),
            type_ids: Vec::new(),
            names: Vec::new(),
            definition: None,
        }
    }

    pub fn with_type_ids<I, S>(mut self, tuis: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_ids = tuis.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }
}

/// Read-only lookup of concept attributes.
///
/// Accessors for an unknown CUI return `None` or an empty slice.
pub trait ConceptDatabase: Send + Sync {
    fn get(&self, cui: &str) -> Option<&ConceptRecord>;

    /// Every concept, in a stable order.
    fn concepts(&self) -> Box<dyn Iterator<Item = &ConceptRecord> + '_>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn preferred_name(&self, cui: &str) -> Option<&str> {
        self.get(cui).map(|c| c.pref_name.as_str())
    }

    fn type_ids(&self, cui: &str) -> &[String] {
        self.get(cui).map(|c| c.type_ids.as_slice()).unwrap_or(&[])
    }

    fn names(&self, cui: &str) -> &[String] {
        self.get(cui).map(|c| c.names.as_slice()).unwrap_or(&[])
    }

    fn definition(&self, cui: &str) -> Option<&str> {
        self.get(cui).and_then(|c| c.definition.as_deref())
    }
}

/// Concept database held in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConceptDb {
    records: Vec<ConceptRecord>,
    by_cui: AHashMap<String, usize>,
}

impl InMemoryConceptDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records; a repeated CUI replaces the earlier record.
    pub fn from_records(records: impl IntoIterator<Item = ConceptRecord>) -> Self {
        let mut db = Self::new();
        for rec in records {
            db.insert(rec);
        }
        db
    }

    /// Load a JSON array of [`ConceptRecord`]s.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let db = Self::from_json_str(&content)?;
        info!("loaded {} concepts from {}", db.len(), path.display());
        Ok(db)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let records: Vec<ConceptRecord> = serde_json::from_str(content)?;
        Ok(Self::from_records(records))
    }

    pub fn insert(&mut self, rec: ConceptRecord) {
        match self.by_cui.get(&rec.cui) {
            Some(&ix) => self.records[ix] = rec,
            None => {
                self.by_cui.insert(rec.cui.clone(), self.records.len());
                self.records.push(rec);
            }
        }
    }
}

impl ConceptDatabase for InMemoryConceptDb {
    fn get(&self, cui: &str) -> Option<&ConceptRecord> {
        self.by_cui.get(cui).map(|&ix| &self.records[ix])
    }

    fn concepts(&self) -> Box<dyn Iterator<Item = &ConceptRecord> + '_> {
        Box::new(self.records.iter())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
