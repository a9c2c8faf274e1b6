//! Text to token sequence.

use std::sync::OnceLock;

use regex::Regex;

use crate::token::Token;
use crate::Result;

/// Words and single punctuation marks; whitespace is dropped.
const DEFAULT_PATTERN: &str = r"\w+|[^\w\s]";

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;
}

/// Tokenizer that emits every match of a regular expression as a token.
#[derive(Debug, Clone)]
pub struct RegexTokenizer {
    pattern: Regex,
}

impl Default for RegexTokenizer {
    fn default() -> Self {
        static DEFAULT: OnceLock<Regex> = OnceLock::new();
        let pattern = DEFAULT
            .get_or_init(|| Regex::new(DEFAULT_PATTERN).expect("static tokenizer pattern"))
            .clone();
        Self { pattern }
    }
}

impl RegexTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pattern(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        self.pattern
            .find_iter(text)
            .enumerate()
            .map(|(i, m)| Token::new(i, m.as_str(), m.start()))
            .collect()
    }
}
