//! Similarity-derived pairs via MinHash LSH

use super::{CandidatePair, ConflictHint, PairOrigin};
use crate::config::{ConfigError, LshConfig};
use crate::facts::Fact;
use crate::metrics::ENGINE_METRICS;
use crate::sketch::{LshIndexBuilder, Signature, Sketcher};
use std::sync::Arc;
use tracing::{debug, info};

/// Category labels treated as high priority when ranking similar pairs
const HIGH_PRIORITY_TYPES: &[&str] = &["data", "date", "conclusion", "数据", "日期", "结论"];

/// Result of one similarity pass
#[derive(Debug, Clone, Default)]
pub struct SimilarityOutput {
    pub pairs: Vec<CandidatePair>,
    /// Facts excluded because their text has fewer than k tokens
    pub skipped: Vec<String>,
}

/// Sketch, index, then query every sketched fact
pub struct SimilarityGenerator {
    sketcher: Arc<Sketcher>,
    bands: usize,
    rows: usize,
    max_pairs: usize,
}

impl SimilarityGenerator {
    pub fn new(sketcher: Arc<Sketcher>, config: &LshConfig) -> Result<Self, ConfigError> {
        let (bands, rows) = config.layout(sketcher.num_perm());
        // Surface a bad layout at construction rather than on first use
        LshIndexBuilder::new(bands, rows, sketcher.num_perm())?;
        Ok(Self {
            sketcher,
            bands,
            rows,
            max_pairs: config.max_similarity_pairs,
        })
    }

    pub fn generate(&self, facts: &[&Fact]) -> SimilarityOutput {
        let mut output = SimilarityOutput::default();
        if facts.len() < 2 {
            return output;
        }

        let sketches: Vec<Option<Signature>> = facts.iter().map(|f| self.sketcher.sketch_fact(f)).collect();

        let mut builder = match LshIndexBuilder::new(self.bands, self.rows, self.sketcher.num_perm()) {
            Ok(builder) => builder,
            Err(_) => return output,
        };
        let mut indexed: Vec<usize> = Vec::with_capacity(facts.len());
        for (i, sketch) in sketches.iter().enumerate() {
            match sketch {
                Some(signature) => {
                    if builder.insert(facts[i].id.as_str(), signature) {
                        indexed.push(i);
                    }
                }
                None => {
                    debug!("Fact {} skipped for similarity: too few tokens", facts[i].id);
                    output.skipped.push(facts[i].id.clone());
                }
            }
        }
        ENGINE_METRICS.record_skipped(output.skipped.len());
        let index = builder.build();

        let mut ranked: Vec<(f64, CandidatePair)> = Vec::new();
        for (position, &i) in indexed.iter().enumerate() {
            let Some(signature) = sketches[i].as_ref() else {
                continue;
            };
            for other in index.query_positions(signature) {
                // Symmetric retrieval: emit each unordered pair from its lower side
                if other <= position {
                    continue;
                }
                let j = indexed[other];
                let Some(other_signature) = sketches[j].as_ref() else {
                    continue;
                };
                let estimate = signature.estimate_jaccard(other_signature);
                let mut pair = CandidatePair::new(&facts[i].id, &facts[j].id, PairOrigin::Similarity)
                    .with_similarity(estimate);
                if estimate >= 1.0 {
                    pair = pair.with_hint(ConflictHint::NearDuplicate);
                }
                ranked.push((priority(facts[i], facts[j]), pair));
            }
        }

        // Stable: equal priorities keep first-appearance order
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        let retrieved = ranked.len();
        output.pairs = ranked.into_iter().take(self.max_pairs).map(|(_, p)| p).collect();

        info!(
            "LSH filter: {} facts ({} skipped) -> {} similar pairs, {} kept",
            facts.len(),
            output.skipped.len(),
            retrieved,
            output.pairs.len()
        );

        output
    }
}

/// Same category +2, each high-priority category +1, plus mean confidence
fn priority(a: &Fact, b: &Fact) -> f64 {
    let mut score = 0.0;
    if a.fact_type.is_some() && a.fact_type == b.fact_type {
        score += 2.0;
    }
    for fact in [a, b] {
        if let Some(kind) = fact.fact_type.as_deref() {
            if HIGH_PRIORITY_TYPES.contains(&kind.to_lowercase().as_str()) {
                score += 1.0;
            }
        }
    }
    score + (a.confidence as f64 + b.confidence as f64) / 2.0
}
