//! Tokenization, shingling, MinHash sketches and the LSH index
//!
//! Sketching is a pure function of a fact's text: two facts with identical
//! shingle sets always receive identical signatures, and the estimated
//! Jaccard similarity between signatures converges to the true shingle-set
//! similarity as the permutation count grows.

pub mod lsh;
pub mod minhash;
pub mod tokenizer;

pub use lsh::{LshIndex, LshIndexBuilder};
pub use minhash::{jaccard, shingles, MinHasher, ShingleSet, Signature};
pub use tokenizer::{MixedScriptTokenizer, Tokenizer, WhitespaceTokenizer};

use crate::config::{ConfigError, SketchConfig};
use crate::facts::Fact;
use std::sync::Arc;

/// Text → tokens → shingles → MinHash signature
pub struct Sketcher {
    tokenizer: Arc<dyn Tokenizer>,
    hasher: MinHasher,
    shingle_size: usize,
}

impl Sketcher {
    /// Create a sketcher with the default mixed-script tokenizer
    pub fn new(config: &SketchConfig) -> Result<Self, ConfigError> {
        let tokenizer = Arc::new(MixedScriptTokenizer::new(config.min_token_chars));
        Self::with_tokenizer(config, tokenizer)
    }

    /// Create a sketcher with a custom tokenizer
    pub fn with_tokenizer(config: &SketchConfig, tokenizer: Arc<dyn Tokenizer>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            tokenizer,
            hasher: MinHasher::new(config.num_perm, config.seed),
            shingle_size: config.shingle_size,
        })
    }

    pub fn num_perm(&self) -> usize {
        self.hasher.num_perm()
    }

    pub fn tokens(&self, text: &str) -> Vec<String> {
        self.tokenizer.tokenize(text)
    }

    pub fn shingles(&self, text: &str) -> ShingleSet {
        shingles(&self.tokens(text), self.shingle_size)
    }

    /// Signature of `text`, or `None` when it has fewer than k tokens
    pub fn sketch(&self, text: &str) -> Option<Signature> {
        self.hasher.signature(&self.shingles(text))
    }

    pub fn sketch_fact(&self, fact: &Fact) -> Option<Signature> {
        self.sketch(&fact.similarity_text())
    }
}
