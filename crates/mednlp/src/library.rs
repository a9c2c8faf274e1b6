//! Convenience access to UMLS, the concept database and cui2vec.

use std::sync::Arc;

use mednlp_ner::{ConceptDatabase, MedicalDocument, MedicalDocumentParser};
use mednlp_uts::Record;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::MedNlpConfig;
use crate::resource::MedicalResources;
use crate::{LibraryError, Result};

/// A concept as known to the local concept database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub cui: String,
    pub name: String,
    pub definition: Option<String>,
    pub tuis: Vec<String>,
}

impl Entity {
    fn lookup(db: &dyn ConceptDatabase, cui: &str) -> Option<Self> {
        db.get(cui).map(|rec| Entity {
            cui: rec.cui.clone(),
            name: rec.pref_name.clone(),
            definition: rec.definition.clone(),
            tuis: rec.type_ids.clone(),
        })
    }
}

/// A concept similar to a query concept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySimilarity {
    pub cui: String,
    /// cui2vec cosine similarity to the query concept.
    pub similarity: f32,
    /// `None` when the concept is not in the local concept database.
    pub entity: Option<Entity>,
}

#[derive(Debug)]
pub struct MedicalLibrary {
    resources: MedicalResources,
}

impl MedicalLibrary {
    pub fn new(config: &MedNlpConfig) -> Self {
        Self {
            resources: MedicalResources::new(config),
        }
    }

    pub fn resources(&self) -> &MedicalResources {
        &self.resources
    }

    /// Preferred UMLS atom of a CUI.
    ///
    /// A CUI unknown to UTS fails with [`mednlp_uts::UtsError::NoResults`];
    /// `None` only comes from a cached miss.
    #[instrument(skip(self))]
    pub fn get_atom(&self, cui: &str) -> Result<Option<Record>> {
        let client = self.resources.uts_client()?;
        let atoms = client.get_atoms(cui, true, true)?;
        Ok(atoms.and_then(|a| a.into_vec().into_iter().next()))
    }

    /// UMLS relations of a CUI in the order returned by UTS.
    ///
    /// Like [`Self::get_atom`], an unknown CUI is a `NoResults` error.
    #[instrument(skip(self))]
    pub fn get_relations(&self, cui: &str) -> Result<Option<Vec<Record>>> {
        let client = self.resources.uts_client()?;
        Ok(client.get_relations(cui, true)?)
    }

    pub fn get_linked_entity(&self, cui: &str) -> Result<Option<Entity>> {
        let db = self.resources.concept_db()?;
        Ok(Entity::lookup(db.as_ref(), cui))
    }

    /// Concepts most similar to the best UMLS match of `term`.
    ///
    /// The term is searched in UTS and the first match's CUI is the query of a
    /// cui2vec nearest neighbour search. No match gives an empty list.
    #[instrument(skip(self))]
    pub fn similarity_by_term(&self, term: &str, topn: usize) -> Result<Vec<EntitySimilarity>> {
        let client = self.resources.uts_client()?;
        let matches = client.search_term(term, 1)?;
        let Some(cui) = matches
            .first()
            .and_then(|m| m.get("ui"))
            .and_then(|ui| ui.as_str())
        else {
            info!("no UTS match for term: {}", term);
            return Ok(Vec::new());
        };
        debug!("similarity query cui: {}", cui);
        self.similarity_by_cui(cui, topn)
    }

    /// Concepts most similar to `cui` by cui2vec.
    pub fn similarity_by_cui(&self, cui: &str, topn: usize) -> Result<Vec<EntitySimilarity>> {
        let embedding = self.resources.cui2vec()?;
        let db = match self.resources.concept_db() {
            Ok(db) => Some(db),
            Err(LibraryError::Configuration(msg)) => {
                debug!("similar concepts without entities: {}", msg);
                None
            }
            Err(e) => return Err(e),
        };
        let sims = embedding.similar_by_word(cui, topn)?;
        Ok(sims
            .into_iter()
            .map(|(rel_cui, similarity)| EntitySimilarity {
                entity: db.as_deref().and_then(|db| Entity::lookup(db, &rel_cui)),
                cui: rel_cui,
                similarity,
            })
            .collect())
    }

    /// The memoized document parser over the configured concept database and
    /// TUI filter.
    pub fn parser(&self) -> Result<Arc<MedicalDocumentParser>> {
        self.resources.parser()
    }

    /// Parse `text` with the memoized parser.
    pub fn parse(&self, text: &str) -> Result<MedicalDocument> {
        Ok(self.parser()?.parse(text))
    }

    /// Drop every loaded resource.
    pub fn clear(&self) {
        self.resources.clear();
    }
}
