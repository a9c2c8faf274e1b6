//! Map concept spans onto a token sequence.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::concept_db::ConceptDatabase;
use crate::token::{ConceptMention, MedicalFeatureToken, Token};
use crate::tui::TuiCatalog;

/// A recognized concept mention over tokens `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
    pub cui: String,
    pub label: String,
    pub detected_name: String,
    pub context_similarity: f64,
}

impl EntitySpan {
    pub fn new(start: usize, end: usize, cui: impl Into<String>) -> Self {
        Self {
            start,
            end,
            cui: cui.into(),
            label: crate::token::CONCEPT_ENTITY_LABEL.to_string(),
            detected_name: String::new(),
            context_similarity: 1.0,
        }
    }

    pub fn with_detected_name(mut self, name: impl Into<String>) -> Self {
        self.detected_name = name.into();
        self
    }

    pub fn with_context_similarity(mut self, similarity: f64) -> Self {
        self.context_similarity = similarity;
        self
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decorated tokens plus the number of span indices that fell outside the
/// token sequence.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub tokens: Vec<MedicalFeatureToken>,
    pub skipped: usize,
}

/// Decorate `tokens` with the concept of the span covering each position.
///
/// Spans are applied in order, so on overlap the later span owns the shared
/// positions. Indices at or past the end of `tokens` are skipped and counted.
pub fn reconcile(
    tokens: Vec<Token>,
    spans: &[EntitySpan],
    db: Arc<dyn ConceptDatabase>,
    tuis: Option<Arc<TuiCatalog>>,
) -> Reconciliation {
    let n = tokens.len();
    let mut owners: Vec<Option<usize>> = vec![None; n];
    let mut skipped = 0;

    for (span_ix, span) in spans.iter().enumerate() {
        for owner in owners.iter_mut().take(span.end).skip(span.start) {
            *owner = Some(span_ix);
        }
        let outside = span.end.saturating_sub(span.start.max(n));
        if outside > 0 {
            warn!(
                start = span.start,
                end = span.end,
                tokens = n,
                skipped = outside,
                cui = %span.cui,
                "span indices outside of document; skipping"
            );
            skipped += outside;
        }
    }

    let mentions: Vec<ConceptMention> = spans.iter().map(ConceptMention::from).collect();
    let tokens = tokens
        .into_iter()
        .zip(owners)
        .map(|(tok, owner)| {
            let mention = owner.map(|ix| mentions[ix].clone());
            MedicalFeatureToken::new(tok, mention, db.clone(), tuis.clone())
        })
        .collect();

    Reconciliation { tokens, skipped }
}
