//! Concept mention recognition.
//!
//! [`DictionaryRecognizer`] matches every name of every concept in a
//! [`ConceptDatabase`] with a single Aho-Corasick automaton, so recognition is
//! linear in the text length regardless of dictionary size.
//!
//! Text is lower cased (Unicode) before matching and match offsets are mapped
//! back onto the original text. Every match is considered, so a longer name
//! that ends inside a token does not hide a shorter name ending on a token
//! boundary.

use std::collections::HashSet;

use ahash::AHashMap;
use aho_corasick::{AhoCorasick, MatchKind};
use tracing::{debug, info};

use crate::concept_db::ConceptDatabase;
use crate::reconcile::EntitySpan;
use crate::token::Token;
use crate::Result;

/// Finds concept mentions in text as token spans.
pub trait EntityRecognizer: Send + Sync {
    /// Spans over `tokens`, which were produced from `text`.
    fn recognize(&self, text: &str, tokens: &[Token]) -> Vec<EntitySpan>;
}

/// Exact, case-insensitive dictionary matching of concept names.
pub struct DictionaryRecognizer {
    automaton: AhoCorasick,
    /// Pattern index → CUI
    pattern_cuis: Vec<String>,
}

impl std::fmt::Debug for DictionaryRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryRecognizer")
            .field("patterns", &self.pattern_cuis.len())
            .finish()
    }
}

impl DictionaryRecognizer {
    /// Build from the preferred name and synonyms of every concept.
    ///
    /// A name shared by several concepts maps to the first concept listing it.
    pub fn new(db: &dyn ConceptDatabase) -> Result<Self> {
        let mut patterns: Vec<String> = Vec::new();
        let mut pattern_cuis: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for concept in db.concepts() {
            let names = std::iter::once(&concept.pref_name).chain(concept.names.iter());
            for name in names {
                let name = name.trim().to_lowercase();
                if name.is_empty() || !seen.insert(name.clone()) {
                    continue;
                }
                patterns.push(name);
                pattern_cuis.push(concept.cui.clone());
            }
        }

        // overlapping search needs standard semantics
        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(&patterns)?;

        info!(
            "dictionary recognizer loaded: {} names for {} concepts",
            patterns.len(),
            db.len()
        );

        Ok(Self {
            automaton,
            pattern_cuis,
        })
    }

    pub fn pattern_count(&self) -> usize {
        self.pattern_cuis.len()
    }
}

impl EntityRecognizer for DictionaryRecognizer {
    fn recognize(&self, text: &str, tokens: &[Token]) -> Vec<EntitySpan> {
        let starts: AHashMap<usize, usize> = tokens.iter().map(|t| (t.offset, t.index)).collect();
        let ends: AHashMap<usize, usize> = tokens.iter().map(|t| (t.end(), t.index)).collect();
        let (lowered, offsets) = lower_with_offsets(text);

        // (first token, last token, pattern, byte range in text)
        let mut candidates = Vec::new();
        for mat in self.automaton.find_overlapping_iter(&lowered) {
            let (begin, end) = (offsets[mat.start()], offsets[mat.end()]);
            match (starts.get(&begin), ends.get(&end)) {
                (Some(&first), Some(&last)) => {
                    candidates.push((first, last, mat.pattern().as_usize(), begin..end))
                }
                _ => debug!(start = begin, end, "match not on token boundaries"),
            }
        }

        // leftmost first, then longest
        candidates.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));

        let mut spans = Vec::new();
        let mut next_free = 0;
        for (first, last, pattern, range) in candidates {
            if first < next_free {
                continue;
            }
            next_free = last + 1;
            spans.push(
                EntitySpan::new(first, last + 1, self.pattern_cuis[pattern].clone())
                    .with_detected_name(text[range].to_lowercase()),
            );
        }
        spans
    }
}

/// Lower case `text` and map each byte of the result to the byte offset of
/// the character it came from. The map has one extra entry for the end.
fn lower_with_offsets(text: &str) -> (String, Vec<usize>) {
    let mut lowered = String::with_capacity(text.len());
    let mut offsets = Vec::with_capacity(text.len() + 1);
    for (ix, ch) in text.char_indices() {
        for lc in ch.to_lowercase() {
            let before = lowered.len();
            lowered.push(lc);
            offsets.resize(offsets.len() + lowered.len() - before, ix);
        }
    }
    offsets.push(text.len());
    (lowered, offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept_db::{ConceptRecord, InMemoryConceptDb};
    use crate::tokenizer::{RegexTokenizer, Tokenizer};

    fn recognizer() -> DictionaryRecognizer {
        let db = InMemoryConceptDb::from_records([
            ConceptRecord::new("C0022646", "Kidney"),
            ConceptRecord::new("C0035078", "Kidney Failure").with_names(["renal failure"]),
            ConceptRecord::new("C0018799", "Heart Diseases").with_names(["heart disease"]),
            ConceptRecord::new("C0018787", "Heart"),
        ]);
        DictionaryRecognizer::new(&db).unwrap()
    }

    fn spans(text: &str) -> Vec<(usize, usize, String)> {
        let tokens = RegexTokenizer::new().tokenize(text);
        recognizer()
            .recognize(text, &tokens)
            .into_iter()
            .map(|s| (s.start, s.end, s.cui))
            .collect()
    }

    #[test]
    fn test_longest_match_wins() {
        assert_eq!(
            spans("He was diagnosed with kidney failure and heart disease."),
            vec![
                (4, 6, "C0035078".to_string()),
                (7, 9, "C0018799".to_string()),
            ]
        );
    }

    #[test]
    fn test_case_insensitive_synonym() {
        assert_eq!(spans("Acute Renal Failure"), vec![(1, 3, "C0035078".to_string())]);
    }

    #[test]
    fn test_matches_respect_token_boundaries() {
        assert!(spans("heartbeat").is_empty());
        assert_eq!(spans("the heart."), vec![(1, 2, "C0018787".to_string())]);
    }

    #[test]
    fn test_shorter_name_found_when_longer_ends_inside_token() {
        let db = InMemoryConceptDb::from_records([
            ConceptRecord::new("C0018787", "Heart"),
            ConceptRecord::new("C0018799", "Heart Disease"),
        ]);
        let rec = DictionaryRecognizer::new(&db).unwrap();
        let text = "congenital heart diseases";
        let tokens = RegexTokenizer::new().tokenize(text);
        let found: Vec<_> = rec
            .recognize(text, &tokens)
            .into_iter()
            .map(|s| (s.start, s.end, s.cui))
            .collect();
        assert_eq!(found, vec![(1, 2, "C0018787".to_string())]);
    }

    #[test]
    fn test_non_ascii_names_match_any_case() {
        let db = InMemoryConceptDb::from_records([ConceptRecord::new(
            "C0025281",
            "Ménière disease",
        )]);
        let rec = DictionaryRecognizer::new(&db).unwrap();
        let text = "Known MÉNIÈRE DISEASE.";
        let tokens = RegexTokenizer::new().tokenize(text);
        let found = rec.recognize(text, &tokens);
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].start, found[0].end), (1, 3));
        assert_eq!(found[0].detected_name, "ménière disease");
    }

    #[test]
    fn test_detected_name_is_lower_cased_text() {
        let text = "KIDNEY FAILURE";
        let tokens = RegexTokenizer::new().tokenize(text);
        let found = recognizer().recognize(text, &tokens);
        assert_eq!(found[0].detected_name, "kidney failure");
        assert_eq!(recognizer().pattern_count(), 6);
    }
}
