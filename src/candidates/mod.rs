//! Candidate pair generation
//!
//! Three generators feed one aggregator:
//! - structural: facts sharing a normalized (subject, predicate, object)
//!   whose value, polarity or time disagree
//! - keyword: facts on opposite sides of a known contradiction pattern
//! - similarity: near-duplicate facts retrieved through MinHash LSH
//!
//! The aggregator merges them into one bounded, reproducible list.

pub mod aggregator;
pub mod keyword;
pub mod similarity;
pub mod structural;

pub use aggregator::Aggregator;
pub use keyword::{builtin_patterns, KeywordGenerator};
pub use similarity::{SimilarityGenerator, SimilarityOutput};
pub use structural::StructuralGenerator;

use crate::config::{ConfigError, EngineConfig};
use crate::facts::{eligible_facts, Fact};
use crate::metrics::ENGINE_METRICS;
use crate::sketch::Sketcher;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Unordered pair key: the two ids in ascending order
pub type PairKey = (String, String);

/// Which generator produced a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairOrigin {
    Structural,
    Keyword,
    Similarity,
}

impl PairOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairOrigin::Structural => "structural",
            PairOrigin::Keyword => "keyword",
            PairOrigin::Similarity => "similarity",
        }
    }
}

/// Why a generator expects the pair to conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictHint {
    DataInconsistency,
    LogicalContradiction,
    TimeConflict,
    NearDuplicate,
}

/// Tentative pair of facts worth adjudicating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePair {
    pub fact_a: String,
    pub fact_b: String,
    pub origin: PairOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<ConflictHint>,
    /// Estimated Jaccard similarity, for similarity-derived pairs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

impl CandidatePair {
    pub fn new(fact_a: &str, fact_b: &str, origin: PairOrigin) -> Self {
        Self {
            fact_a: fact_a.to_string(),
            fact_b: fact_b.to_string(),
            origin,
            hint: None,
            similarity: None,
        }
    }

    pub fn with_hint(mut self, hint: ConflictHint) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn with_similarity(mut self, similarity: f64) -> Self {
        self.similarity = Some(similarity);
        self
    }

    /// Unordered key: (a, b) and (b, a) map to the same value
    pub fn key(&self) -> PairKey {
        if self.fact_a <= self.fact_b {
            (self.fact_a.clone(), self.fact_b.clone())
        } else {
            (self.fact_b.clone(), self.fact_a.clone())
        }
    }

    pub fn is_self_pair(&self) -> bool {
        self.fact_a == self.fact_b
    }
}

/// Per-origin counts before aggregation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateStats {
    pub eligible_facts: usize,
    pub structural: usize,
    pub keyword: usize,
    pub similarity: usize,
    pub skipped_for_similarity: usize,
    pub aggregated: usize,
}

/// Bounded candidate list plus generation statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateSet {
    pub pairs: Vec<CandidatePair>,
    pub stats: CandidateStats,
}

impl CandidateSet {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

/// Runs all generators and the aggregator
pub struct CandidateEngine {
    structural: StructuralGenerator,
    keyword: KeywordGenerator,
    similarity: SimilarityGenerator,
    aggregator: Aggregator,
}

impl CandidateEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        let sketcher = Arc::new(Sketcher::new(&config.sketch)?);
        Self::with_sketcher(config, sketcher)
    }

    /// Build with a shared sketcher (custom tokenizer, or reuse elsewhere)
    pub fn with_sketcher(config: &EngineConfig, sketcher: Arc<Sketcher>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            structural: StructuralGenerator::new(config.structural.clone()),
            keyword: KeywordGenerator::new(&config.keyword),
            similarity: SimilarityGenerator::new(sketcher, &config.lsh)?,
            aggregator: Aggregator::new(&config.aggregator),
        })
    }

    /// Generate the bounded candidate list for one document
    ///
    /// Structural pairs come first, then keyword pairs, then similarity
    /// pairs, so the most specific origin is kept on duplicates.
    pub fn generate(&self, facts: &[Fact]) -> CandidateSet {
        let eligible = eligible_facts(facts);
        let mut stats = CandidateStats {
            eligible_facts: eligible.len(),
            ..CandidateStats::default()
        };
        if eligible.len() < 2 {
            info!("Candidate generation skipped: {} eligible facts", eligible.len());
            return CandidateSet {
                pairs: Vec::new(),
                stats,
            };
        }

        let structural = self.structural.generate(&eligible);
        let keyword = self.keyword.generate(&eligible);
        let similarity = self.similarity.generate(&eligible);

        stats.structural = structural.len();
        stats.keyword = keyword.len();
        stats.similarity = similarity.pairs.len();
        stats.skipped_for_similarity = similarity.skipped.len();

        let pairs = self
            .aggregator
            .aggregate(structural.into_iter().chain(keyword).chain(similarity.pairs));
        stats.aggregated = pairs.len();

        for pair in &pairs {
            ENGINE_METRICS.record_candidate(pair.origin);
        }

        info!(
            "Candidates: {} facts -> {} structural, {} keyword, {} similarity -> {} aggregated (cap {})",
            eligible.len(),
            stats.structural,
            stats.keyword,
            stats.similarity,
            stats.aggregated,
            self.aggregator.max_candidates()
        );

        CandidateSet { pairs, stats }
    }
}
