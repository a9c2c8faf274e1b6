//! Text to medical feature tokens.
//!
//! Pipeline: tokenize → recognize concept spans → drop spans outside the TUI
//! filter → reconcile spans onto tokens.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::concept_db::ConceptDatabase;
use crate::recognizer::{DictionaryRecognizer, EntityRecognizer};
use crate::reconcile::{reconcile, EntitySpan};
use crate::token::MedicalFeatureToken;
use crate::tokenizer::{RegexTokenizer, Tokenizer};
use crate::tui::TuiCatalog;
use crate::{NerError, Result};

/// A parsed document.
#[derive(Debug, Clone)]
pub struct MedicalDocument {
    pub text: String,
    pub tokens: Vec<MedicalFeatureToken>,
    /// Recognized spans after TUI filtering, in recognition order.
    pub spans: Vec<EntitySpan>,
    /// Span indices that fell outside the token sequence.
    pub skipped: usize,
}

impl MedicalDocument {
    pub fn concept_tokens(&self) -> impl Iterator<Item = &MedicalFeatureToken> {
        self.tokens.iter().filter(|t| t.is_concept())
    }

    /// Tokens grouped by the mention they belong to, in document order.
    pub fn entities(&self) -> Vec<Vec<&MedicalFeatureToken>> {
        let mut ents: Vec<Vec<&MedicalFeatureToken>> = Vec::new();
        let mut current: Option<(&str, std::ops::Range<usize>)> = None;
        for tok in &self.tokens {
            let Some(mention) = tok.mention() else {
                current = None;
                continue;
            };
            let key = (mention.cui.as_str(), mention.span.clone());
            match ents.last_mut() {
                Some(last) if current.as_ref() == Some(&key) => last.push(tok),
                _ => {
                    ents.push(vec![tok]);
                    current = Some(key);
                }
            }
        }
        ents
    }
}

pub struct MedicalDocumentParser {
    tokenizer: Box<dyn Tokenizer>,
    recognizer: Box<dyn EntityRecognizer>,
    db: Arc<dyn ConceptDatabase>,
    tuis: Option<Arc<TuiCatalog>>,
    tui_filter: Option<BTreeSet<String>>,
}

impl std::fmt::Debug for MedicalDocumentParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MedicalDocumentParser")
            .field("concepts", &self.db.len())
            .field("tui_filter", &self.tui_filter)
            .finish()
    }
}

impl MedicalDocumentParser {
    pub fn builder() -> MedicalDocumentParserBuilder {
        MedicalDocumentParserBuilder::default()
    }

    pub fn concept_db(&self) -> &Arc<dyn ConceptDatabase> {
        &self.db
    }

    pub fn tui_filter(&self) -> Option<&BTreeSet<String>> {
        self.tui_filter.as_ref()
    }

    pub fn parse(&self, text: &str) -> MedicalDocument {
        let tokens = self.tokenizer.tokenize(text);
        let mut spans = self.recognizer.recognize(text, &tokens);
        let found = spans.len();
        if let Some(filter) = &self.tui_filter {
            spans.retain(|s| {
                self.db
                    .type_ids(&s.cui)
                    .iter()
                    .any(|tui| filter.contains(tui))
            });
        }
        debug!(
            tokens = tokens.len(),
            spans = spans.len(),
            filtered = found - spans.len(),
            "parsed"
        );
        let rec = reconcile(tokens, &spans, self.db.clone(), self.tuis.clone());
        MedicalDocument {
            text: text.to_string(),
            tokens: rec.tokens,
            spans,
            skipped: rec.skipped,
        }
    }
}

/// Builder for [`MedicalDocumentParser`]; a concept database is required.
#[derive(Default)]
pub struct MedicalDocumentParserBuilder {
    tokenizer: Option<Box<dyn Tokenizer>>,
    recognizer: Option<Box<dyn EntityRecognizer>>,
    db: Option<Arc<dyn ConceptDatabase>>,
    tuis: Option<Arc<TuiCatalog>>,
    filter_tuis: Vec<String>,
    filter_groups: Vec<String>,
}

impl MedicalDocumentParserBuilder {
    pub fn concept_db(mut self, db: Arc<dyn ConceptDatabase>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn tokenizer(mut self, tokenizer: impl Tokenizer + 'static) -> Self {
        self.tokenizer = Some(Box::new(tokenizer));
        self
    }

    pub fn recognizer(mut self, recognizer: impl EntityRecognizer + 'static) -> Self {
        self.recognizer = Some(Box::new(recognizer));
        self
    }

    pub fn tui_catalog(mut self, catalog: Arc<TuiCatalog>) -> Self {
        self.tuis = Some(catalog);
        self
    }

    /// Keep only concepts with at least one of these semantic types.
    pub fn filter_tuis<I, S>(mut self, tuis: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_tuis.extend(tuis.into_iter().map(Into::into));
        self
    }

    /// Like [`Self::filter_tuis`] with the TUIs of matching semantic groups.
    /// Requires a TUI catalog.
    pub fn filter_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<MedicalDocumentParser> {
        let db = self.db.ok_or_else(|| {
            NerError::Configuration("a concept database is required".to_string())
        })?;

        let tui_filter = match &self.tuis {
            Some(cat) => cat.filter_tuis(self.filter_tuis.as_slice(), self.filter_groups.as_slice())?,
            None if !self.filter_groups.is_empty() => {
                return Err(NerError::Configuration(
                    "filtering on groups requires a TUI catalog".to_string(),
                ))
            }
            None if self.filter_tuis.is_empty() => None,
            None => Some(self.filter_tuis.into_iter().collect()),
        };

        let recognizer: Box<dyn EntityRecognizer> = match self.recognizer {
            Some(r) => r,
            None => Box::new(DictionaryRecognizer::new(db.as_ref())?),
        };
        let tokenizer: Box<dyn Tokenizer> = self
            .tokenizer
            .unwrap_or_else(|| Box::new(RegexTokenizer::new()));

        info!(concepts = db.len(), filtered = tui_filter.is_some(), "parser ready");
        Ok(MedicalDocumentParser {
            tokenizer,
            recognizer,
            db,
            tuis: self.tuis,
            tui_filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept_db::{ConceptRecord, InMemoryConceptDb};
    use crate::token::Token;

    fn db() -> Arc<dyn ConceptDatabase> {
        Arc::new(InMemoryConceptDb::from_records([
            ConceptRecord::new("C0035078", "Kidney Failure").with_type_ids(["T047"]),
            ConceptRecord::new("C0018787", "Heart").with_type_ids(["T023"]),
        ]))
    }

    struct FixedSpans(Vec<EntitySpan>);

    impl EntityRecognizer for FixedSpans {
        fn recognize(&self, _text: &str, _tokens: &[Token]) -> Vec<EntitySpan> {
            self.0.clone()
        }
    }

    #[test]
    fn test_build_requires_concept_db() {
        let err = MedicalDocumentParser::builder().build().unwrap_err();
        assert!(matches!(err, NerError::Configuration(_)));
    }

    #[test]
    fn test_groups_without_catalog_is_configuration_error() {
        let err = MedicalDocumentParser::builder()
            .concept_db(db())
            .filter_groups(["Disorders"])
            .build()
            .unwrap_err();
        assert!(matches!(err, NerError::Configuration(_)));
    }

    #[test]
    fn test_tui_filter_drops_spans() {
        let parser = MedicalDocumentParser::builder()
            .concept_db(db())
            .filter_tuis(["T047"])
            .build()
            .unwrap();
        let doc = parser.parse("kidney failure of the heart");
        let cuis: Vec<_> = doc.concept_tokens().filter_map(|t| t.cui_()).collect();
        assert_eq!(cuis, vec!["C0035078", "C0035078"]);
        assert_eq!(doc.spans.len(), 1);
    }

    #[test]
    fn test_group_filter_through_catalog() {
        let catalog = TuiCatalog::parse(
            "dsyn|T047|Disease or Syndrome\nbpoc|T023|Body Part\n",
            Some("DISO|Disorders|T047|Disease or Syndrome\nANAT|Anatomy|T023|Body Part\n"),
        )
        .unwrap();
        let parser = MedicalDocumentParser::builder()
            .concept_db(db())
            .tui_catalog(Arc::new(catalog))
            .filter_groups(["Anatomy"])
            .build()
            .unwrap();
        let doc = parser.parse("kidney failure of the heart");
        assert_eq!(doc.entities().len(), 1);
        assert_eq!(doc.entities()[0][0].cui_(), Some("C0018787"));
    }

    #[test]
    fn test_entities_group_adjacent_mentions_separately() {
        let parser = MedicalDocumentParser::builder()
            .concept_db(db())
            .recognizer(FixedSpans(vec![
                EntitySpan::new(0, 2, "C0035078"),
                EntitySpan::new(2, 3, "C0035078"),
            ]))
            .build()
            .unwrap();
        let doc = parser.parse("kidney failure again");
        let groups: Vec<usize> = doc.entities().iter().map(Vec::len).collect();
        assert_eq!(groups, vec![2, 1]);
    }

    #[test]
    fn test_skipped_indices_reach_document() {
        let parser = MedicalDocumentParser::builder()
            .concept_db(db())
            .recognizer(FixedSpans(vec![EntitySpan::new(1, 5, "C0018787")]))
            .build()
            .unwrap();
        let doc = parser.parse("the heart");
        assert_eq!(doc.skipped, 3);
        assert_eq!(doc.concept_tokens().count(), 1);
    }
}
