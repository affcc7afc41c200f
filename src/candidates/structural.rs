//! Structural pair generation over (subject, predicate, object) buckets

use super::{CandidatePair, ConflictHint, PairOrigin};
use crate::config::StructuralConfig;
use crate::facts::Fact;
use indexmap::IndexMap;
use tracing::debug;

/// Emits high-confidence pairs from facts that share a normalized triple
pub struct StructuralGenerator {
    config: StructuralConfig,
}

impl StructuralGenerator {
    pub fn new(config: StructuralConfig) -> Self {
        Self { config }
    }

    /// Pairs in bucket order (first appearance of each triple), then by
    /// position within the bucket; deterministic for a given input
    pub fn generate(&self, facts: &[&Fact]) -> Vec<CandidatePair> {
        let mut buckets: IndexMap<(String, String, String), Vec<&Fact>> = IndexMap::new();
        for fact in facts {
            let key = fact.triple_key();
            // An all-empty triple carries no structure to compare on
            if key.0.is_empty() && key.1.is_empty() && key.2.is_empty() {
                continue;
            }
            buckets.entry(key).or_default().push(fact);
        }

        let mut pairs = Vec::new();
        for (key, members) in &buckets {
            if members.len() < 2 {
                continue;
            }
            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    let (a, b) = (members[i], members[j]);
                    if let Some(hint) = self.classify(a, b) {
                        debug!("Structural pair {} / {} on {:?}: {:?}", a.id, b.id, key, hint);
                        pairs.push(CandidatePair::new(&a.id, &b.id, PairOrigin::Structural).with_hint(hint));
                        if pairs.len() >= self.config.max_pairs {
                            return pairs;
                        }
                    }
                }
            }
        }

        pairs
    }

    /// First matching rule wins: polarity, then value, then time
    pub fn classify(&self, a: &Fact, b: &Fact) -> Option<ConflictHint> {
        if a.polarity != b.polarity {
            return Some(ConflictHint::LogicalContradiction);
        }
        if let (Some(va), Some(vb)) = (a.value, b.value) {
            if self.values_conflict(va, vb, a.is_percent() || b.is_percent()) {
                return Some(ConflictHint::DataInconsistency);
            }
        }
        match (a.normalized_time(), b.normalized_time()) {
            (Some(ta), Some(tb)) if ta != tb => Some(ConflictHint::TimeConflict),
            _ => None,
        }
    }

    /// Percent values compare in percentage points; plain values conflict
    /// on either the relative or the absolute threshold
    pub fn values_conflict(&self, a: f64, b: f64, percent: bool) -> bool {
        let diff = (a - b).abs();
        if percent {
            return diff >= self.config.percent_point_threshold;
        }
        let scale = a.abs().max(b.abs());
        let relative = scale > 0.0 && diff / scale > self.config.relative_threshold;
        relative || diff > self.config.absolute_threshold
    }
}
