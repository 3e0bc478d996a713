//! Text analysis for Gindex.
//!
//! Tokenization is a collaborator of the index core: the store consumes the
//! terms a tokenizer produces but imposes no analysis pipeline of its own.

pub mod tokenizer;

pub use tokenizer::{NGramTokenizer, Tokenizer, UnicodeWordTokenizer};
