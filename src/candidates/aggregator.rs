//! Merge, de-duplicate and bound candidate pairs

use super::{CandidatePair, PairKey};
use crate::config::AggregatorConfig;
use std::collections::HashSet;
use tracing::debug;

/// Candidate aggregator
///
/// Pairs are keyed as unordered; the first occurrence of a key wins and
/// keeps its origin tag. Self-pairs are dropped. The output preserves the
/// order of first appearance and never exceeds `max_candidates`.
pub struct Aggregator {
    max_candidates: usize,
}

impl Aggregator {
    pub fn new(config: &AggregatorConfig) -> Self {
        Self {
            max_candidates: config.max_candidates,
        }
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    pub fn aggregate<I>(&self, pairs: I) -> Vec<CandidatePair>
    where
        I: IntoIterator<Item = CandidatePair>,
    {
        let mut seen: HashSet<PairKey> = HashSet::new();
        let mut merged = Vec::new();
        let mut duplicates = 0usize;
        let mut self_pairs = 0usize;

        for pair in pairs {
            if pair.is_self_pair() {
                self_pairs += 1;
                continue;
            }
            if !seen.insert(pair.key()) {
                duplicates += 1;
                continue;
            }
            if merged.len() >= self.max_candidates {
                continue;
            }
            merged.push(pair);
        }

        debug!(
            "Aggregated {} candidates ({} unique, {} duplicates, {} self-pairs, cap {})",
            merged.len(),
            seen.len(),
            duplicates,
            self_pairs,
            self.max_candidates
        );

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::PairOrigin;
    use std::collections::BTreeSet;

    fn pair(a: &str, b: &str, origin: PairOrigin) -> CandidatePair {
        CandidatePair::new(a, b, origin)
    }

    #[test]
    fn test_dedupe_keeps_first_origin() {
        let aggregator = Aggregator::new(&AggregatorConfig::default());
        let merged = aggregator.aggregate(vec![
            pair("a", "b", PairOrigin::Structural),
            pair("b", "a", PairOrigin::Similarity),
            pair("a", "c", PairOrigin::Keyword),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].origin, PairOrigin::Structural);
        assert_eq!(merged[1].key(), ("a".to_string(), "c".to_string()));
    }

    #[test]
    fn test_self_pairs_removed() {
        let aggregator = Aggregator::new(&AggregatorConfig::default());
        let merged = aggregator.aggregate(vec![pair("a", "a", PairOrigin::Keyword), pair("a", "b", PairOrigin::Keyword)]);
        assert_eq!(merged.len(), 1);
        assert!(merged.iter().all(|p| !p.is_self_pair()));
    }

    #[test]
    fn test_cap_respected_in_first_appearance_order() {
        let aggregator = Aggregator::new(&AggregatorConfig { max_candidates: 3 });
        let pairs: Vec<CandidatePair> = (0..10)
            .map(|i| pair(&format!("x{}", i), &format!("y{}", i), PairOrigin::Similarity))
            .collect();
        let merged = aggregator.aggregate(pairs);
        let ids: Vec<&str> = merged.iter().map(|p| p.fact_a.as_str()).collect();
        assert_eq!(ids, vec!["x0", "x1", "x2"]);
    }

    #[test]
    fn test_order_independent_key_set() {
        let aggregator = Aggregator::new(&AggregatorConfig::default());
        let structural = vec![pair("a", "b", PairOrigin::Structural), pair("c", "d", PairOrigin::Structural)];
        let keyword = vec![pair("b", "a", PairOrigin::Keyword), pair("a", "e", PairOrigin::Keyword)];
        let similarity = vec![pair("d", "c", PairOrigin::Similarity), pair("e", "f", PairOrigin::Similarity)];

        let forward: BTreeSet<_> = aggregator
            .aggregate(structural.iter().chain(&keyword).chain(&similarity).cloned())
            .iter()
            .map(CandidatePair::key)
            .collect();
        let backward: BTreeSet<_> = aggregator
            .aggregate(similarity.iter().chain(&keyword).chain(&structural).cloned())
            .iter()
            .map(CandidatePair::key)
            .collect();

        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 4);
    }

    #[test]
    fn test_empty_input() {
        let aggregator = Aggregator::new(&AggregatorConfig::default());
        assert!(aggregator.aggregate(Vec::new()).is_empty());
    }
}
