//! Tokens decorated with medical concept features.
//!
//! Feature names follow the convention that a trailing underscore marks the
//! string rendering of a feature: `cui` is numeric (`242379`) while `cui_` is
//! the identifier (`C0242379`). Every feature can be read by [`FeatureId`],
//! and [`MedicalFeatureToken::features`] takes a serializable snapshot.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::concept_db::ConceptDatabase;
use crate::reconcile::EntitySpan;
use crate::tui::TuiCatalog;
use crate::{NerError, Result};

/// Entity label of tokens that are part of a concept.
pub const CONCEPT_ENTITY_LABEL: &str = "concept";

/// Parse the numeric part of a CUI: `C0242379` → `242379`.
///
/// The identifier must be a single ASCII uppercase letter followed by one or
/// more digits.
pub fn numeric_cui(cui: &str) -> Result<u64> {
    let mut chars = cui.chars();
    let body = match chars.next() {
        Some(c) if c.is_ascii_uppercase() => chars.as_str(),
        _ => return Err(NerError::MalformedCui(cui.to_string())),
    };
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NerError::MalformedCui(cui.to_string()));
    }
    body.parse()
        .map_err(|_| NerError::MalformedCui(cui.to_string()))
}

/// A token as produced by a [`crate::Tokenizer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Position in the document's token sequence.
    pub index: usize,
    pub text: String,
    /// Lower-cased text.
    pub norm: String,
    /// Byte offset of the token in the document text.
    pub offset: usize,
    /// Entity label assigned by the tokenizer, if any.
    pub ent_label: Option<String>,
}

impl Token {
    pub fn new(index: usize, text: impl Into<String>, offset: usize) -> Self {
        let text = text.into();
        Self {
            index,
            norm: text.to_lowercase(),
            text,
            offset,
            ent_label: None,
        }
    }

    /// Byte offset just past the token.
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

/// The concept a token belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptMention {
    pub cui: String,
    pub label: String,
    /// Name as detected in the text.
    pub detected_name: String,
    pub context_similarity: f64,
    /// Token range of the whole mention.
    pub span: Range<usize>,
}

impl From<&EntitySpan> for ConceptMention {
    fn from(span: &EntitySpan) -> Self {
        Self {
            cui: span.cui.clone(),
            label: span.label.clone(),
            detected_name: span.detected_name.clone(),
            context_similarity: span.context_similarity,
            span: span.start..span.end,
        }
    }
}

// ── Feature identifiers ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureId {
    Index,
    Text,
    Norm,
    Ent,
    IsConcept,
    Cui,
    CuiStr,
    PrefName,
    DetectedName,
    SubNames,
    ContextSimilarity,
    Tuis,
    TuisStr,
    TuiDescs,
    Definition,
}

impl FeatureId {
    pub const ALL: [FeatureId; 15] = [
        FeatureId::Index,
        FeatureId::Text,
        FeatureId::Norm,
        FeatureId::Ent,
        FeatureId::IsConcept,
        FeatureId::Cui,
        FeatureId::CuiStr,
        FeatureId::PrefName,
        FeatureId::DetectedName,
        FeatureId::SubNames,
        FeatureId::ContextSimilarity,
        FeatureId::Tuis,
        FeatureId::TuisStr,
        FeatureId::TuiDescs,
        FeatureId::Definition,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureId::Index => "i",
            FeatureId::Text => "text",
            FeatureId::Norm => "norm",
            FeatureId::Ent => "ent_",
            FeatureId::IsConcept => "is_concept",
            FeatureId::Cui => "cui",
            FeatureId::CuiStr => "cui_",
            FeatureId::PrefName => "pref_name_",
            FeatureId::DetectedName => "detected_name_",
            FeatureId::SubNames => "sub_names",
            FeatureId::ContextSimilarity => "context_similarity",
            FeatureId::Tuis => "tuis",
            FeatureId::TuisStr => "tuis_",
            FeatureId::TuiDescs => "tui_descs_",
            FeatureId::Definition => "definition_",
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureId {
    type Err = NerError;

    fn from_str(s: &str) -> Result<Self> {
        FeatureId::ALL
            .into_iter()
            .find(|id| id.name() == s)
            .ok_or_else(|| NerError::UnknownFeature(s.to_string()))
    }
}

/// Value of a single feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    None,
    Bool(bool),
    Int(u64),
    Float(f64),
    Str(String),
    List(Vec<String>),
}

impl FeatureValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FeatureValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, FeatureValue::None)
    }
}

impl From<Option<String>> for FeatureValue {
    fn from(v: Option<String>) -> Self {
        v.map(FeatureValue::Str).unwrap_or(FeatureValue::None)
    }
}

/// Snapshot of every feature of a token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenFeatures {
    pub i: usize,
    pub text: String,
    pub norm: String,
    pub ent_: Option<String>,
    pub is_concept: bool,
    pub cui: Option<u64>,
    pub cui_: Option<String>,
    pub pref_name_: Option<String>,
    pub detected_name_: Option<String>,
    pub sub_names: Vec<String>,
    pub context_similarity: Option<f64>,
    pub tuis: Vec<String>,
    pub tuis_: Option<String>,
    pub tui_descs_: Option<String>,
    pub definition_: Option<String>,
}

// ── Medical feature token ─────────────────────────────────────────────────────

/// A token that optionally belongs to a medical concept.
///
/// Concept attributes are looked up in the concept database on access.
#[derive(Clone)]
pub struct MedicalFeatureToken {
    token: Token,
    mention: Option<ConceptMention>,
    db: Arc<dyn ConceptDatabase>,
    tuis: Option<Arc<TuiCatalog>>,
}

impl fmt::Debug for MedicalFeatureToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MedicalFeatureToken")
            .field("token", &self.token)
            .field("mention", &self.mention)
            .finish()
    }
}

impl fmt::Display for MedicalFeatureToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cui_() {
            Some(cui) => write!(f, "{} ({})", self.token.norm, cui),
            None => f.write_str(&self.token.norm),
        }
    }
}

impl MedicalFeatureToken {
    pub fn new(
        token: Token,
        mention: Option<ConceptMention>,
        db: Arc<dyn ConceptDatabase>,
        tuis: Option<Arc<TuiCatalog>>,
    ) -> Self {
        Self {
            token,
            mention,
            db,
            tuis,
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn mention(&self) -> Option<&ConceptMention> {
        self.mention.as_ref()
    }

    pub fn index(&self) -> usize {
        self.token.index
    }

    pub fn text(&self) -> &str {
        &self.token.text
    }

    pub fn norm(&self) -> &str {
        &self.token.norm
    }

    pub fn is_concept(&self) -> bool {
        self.mention.is_some()
    }

    /// The concept label when part of a concept, otherwise the token's own label.
    pub fn ent_(&self) -> Option<&str> {
        match &self.mention {
            Some(m) => Some(&m.label),
            None => self.token.ent_label.as_deref(),
        }
    }

    pub fn cui_(&self) -> Option<&str> {
        self.mention.as_ref().map(|m| m.cui.as_str())
    }

    /// Numeric concept identifier, failing on a malformed CUI.
    pub fn cui(&self) -> Result<Option<u64>> {
        self.cui_().map(numeric_cui).transpose()
    }

    pub fn pref_name_(&self) -> Option<&str> {
        self.cui_().and_then(|cui| self.db.preferred_name(cui))
    }

    pub fn detected_name_(&self) -> Option<&str> {
        self.mention.as_ref().map(|m| m.detected_name.as_str())
    }

    /// Sorted synonyms of the concept.
    pub fn sub_names(&self) -> Vec<String> {
        self.sorted(|db, cui| db.names(cui))
    }

    pub fn context_similarity(&self) -> Option<f64> {
        self.mention.as_ref().map(|m| m.context_similarity)
    }

    /// Sorted semantic type identifiers of the concept.
    pub fn tuis(&self) -> Vec<String> {
        self.sorted(|db, cui| db.type_ids(cui))
    }

    pub fn tuis_(&self) -> Option<String> {
        self.is_concept().then(|| self.tuis().join(","))
    }

    /// Descriptions of [`Self::tuis`], with `? (Txxx)` for unknown types.
    pub fn tui_descs_(&self) -> Option<String> {
        if !self.is_concept() {
            return None;
        }
        let descs: Vec<String> = self
            .tuis()
            .into_iter()
            .map(|tui| {
                self.tuis
                    .as_deref()
                    .and_then(|cat| cat.description(&tui))
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("? ({})", tui))
            })
            .collect();
        Some(descs.join(", "))
    }

    pub fn definition_(&self) -> Option<&str> {
        self.cui_().and_then(|cui| self.db.definition(cui))
    }

    /// Read a single feature.
    pub fn get(&self, id: FeatureId) -> Result<FeatureValue> {
        let own = |s: Option<&str>| FeatureValue::from(s.map(str::to_string));
        Ok(match id {
            FeatureId::Index => FeatureValue::Int(self.token.index as u64),
            FeatureId::Text => FeatureValue::Str(self.token.text.clone()),
            FeatureId::Norm => FeatureValue::Str(self.token.norm.clone()),
            FeatureId::Ent => own(self.ent_()),
            FeatureId::IsConcept => FeatureValue::Bool(self.is_concept()),
            FeatureId::Cui => self.cui()?.map(FeatureValue::Int).unwrap_or(FeatureValue::None),
            FeatureId::CuiStr => own(self.cui_()),
            FeatureId::PrefName => own(self.pref_name_()),
            FeatureId::DetectedName => own(self.detected_name_()),
            FeatureId::SubNames => FeatureValue::List(self.sub_names()),
            FeatureId::ContextSimilarity => self
                .context_similarity()
                .map(FeatureValue::Float)
                .unwrap_or(FeatureValue::None),
            FeatureId::Tuis => FeatureValue::List(self.tuis()),
            FeatureId::TuisStr => self.tuis_().into(),
            FeatureId::TuiDescs => self.tui_descs_().into(),
            FeatureId::Definition => own(self.definition_()),
        })
    }

    /// Snapshot of every feature.
    pub fn features(&self) -> Result<TokenFeatures> {
        Ok(TokenFeatures {
            i: self.token.index,
            text: self.token.text.clone(),
            norm: self.token.norm.clone(),
            ent_: self.ent_().map(str::to_string),
            is_concept: self.is_concept(),
            cui: self.cui()?,
            cui_: self.cui_().map(str::to_string),
            pref_name_: self.pref_name_().map(str::to_string),
            detected_name_: self.detected_name_().map(str::to_string),
            sub_names: self.sub_names(),
            context_similarity: self.context_similarity(),
            tuis: self.tuis(),
            tuis_: self.tuis_(),
            tui_descs_: self.tui_descs_(),
            definition_: self.definition_().map(str::to_string),
        })
    }

    fn sorted<F>(&self, field: F) -> Vec<String>
    where
        F: for<'a> Fn(&'a dyn ConceptDatabase, &str) -> &'a [String],
    {
        let Some(cui) = self.cui_() else {
            return Vec::new();
        };
        let mut vals = field(self.db.as_ref(), cui).to_vec();
        vals.sort();
        vals
    }
}
