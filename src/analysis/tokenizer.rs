//! Tokenizer implementations for column text.
//!
//! Tokenizers split row text into the terms that get indexed. The index core
//! never tokenizes by itself; callers run a tokenizer over each row and feed
//! the resulting terms to the store, and run the same tokenizer over query
//! strings on the read path.

use unicode_segmentation::UnicodeSegmentation;

use crate::error::{GindexError, Result};

/// Trait for tokenizers that convert text into terms.
///
/// The trait requires `Send + Sync` to allow use in concurrent contexts.
/// Implementations must be deterministic: the same text always yields the
/// same term sequence, so write-path and query-path tokenization agree.
pub trait Tokenizer: Send + Sync {
    /// Tokenize the given text into an ordered sequence of terms.
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;

    /// Get the name of this tokenizer (for debugging and configuration).
    fn name(&self) -> &'static str;
}

/// Splits text at Unicode word boundaries and lowercases each word.
#[derive(Debug, Clone, Default)]
pub struct UnicodeWordTokenizer;

impl UnicodeWordTokenizer {
    pub fn new() -> Self {
        UnicodeWordTokenizer
    }
}

impl Tokenizer for UnicodeWordTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        Ok(text
            .unicode_words()
            .map(|word| word.to_lowercase())
            .collect())
    }

    fn name(&self) -> &'static str {
        "unicode_word"
    }
}

/// Character n-gram tokenizer for substring matching.
#[derive(Debug, Clone)]
pub struct NGramTokenizer {
    n: usize,
}

impl NGramTokenizer {
    pub fn new(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(GindexError::analysis("n-gram size must be at least 1"));
        }
        Ok(NGramTokenizer { n })
    }
}

impl Tokenizer for NGramTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let chars: Vec<char> = text.to_lowercase().chars().collect();
        if chars.len() < self.n {
            return Ok(Vec::new());
        }

        Ok(chars
            .windows(self.n)
            .map(|window| window.iter().collect())
            .collect())
    }

    fn name(&self) -> &'static str {
        "ngram"
    }
}
