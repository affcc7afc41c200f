//! Repetition pass
//!
//! Folds near-identical facts into clusters so that heavily repeated
//! phrasing is reported once with a count instead of as many pairwise
//! verdicts. A second scan looks for sentences repeated across sections.

use super::{PairOutcome, Verdict, VerdictKind};
use crate::config::RepetitionConfig;
use crate::facts::{normalize_role, Fact, Section};
use crate::metrics::ENGINE_METRICS;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

const SENTENCE_BREAKS: &[char] = &['。', '！', '？', '\n', '.', '!', '?', ';'];

/// Where a cluster was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepetitionSource {
    /// Near-identical facts among adjudicated pairs
    Facts,
    /// Sentences repeated across document sections
    Sections,
}

/// Group of near-identical content reported once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepetitionCluster {
    /// Fact ids in document order; empty for section-scan clusters
    pub members: Vec<String>,
    pub representative: String,
    pub count: usize,
    pub locations: Vec<String>,
    pub source: RepetitionSource,
}

/// Character-level similarity in [0, 1]: one minus the normalized edit distance
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = normalize_role(a).chars().collect();
    let b: Vec<char> = normalize_role(b).chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let longest = a.len().max(b.len());
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    1.0 - previous[b.len()] as f64 / longest as f64
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Lower index stays root so clusters are rooted at their first fact
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

/// A conflict verdict other than repetition keeps two facts apart
fn links_repetition(verdict: &Verdict) -> bool {
    verdict.kind == VerdictKind::Repetition || !verdict.has_conflict_or_repetition
}

pub struct RepetitionDetector {
    config: RepetitionConfig,
}

impl RepetitionDetector {
    pub fn new(config: &RepetitionConfig) -> Self {
        Self { config: config.clone() }
    }

    fn is_near_identical(&self, a: &Fact, b: &Fact) -> bool {
        let (la, lb) = (a.content.chars().count(), b.content.chars().count());
        let (short, long) = (la.min(lb), la.max(lb));
        // Edit distance is at least the length gap
        if long == 0 || (short as f64 / long as f64) < self.config.near_identical_threshold {
            return false;
        }
        text_similarity(&a.content, &b.content) >= self.config.near_identical_threshold
    }

    /// Replace pairwise outcomes of large near-identical groups with clusters
    ///
    /// Only resolved pairs whose verdict is a repetition or no conflict link
    /// facts together; a conflict verdict always survives as a pairwise
    /// outcome. Groups smaller than `min_cluster_size` keep their pairwise
    /// outcomes, and only the near-identical pairs of a reported group are
    /// folded into it.
    pub fn cluster(&self, outcomes: Vec<PairOutcome>, facts: &[Fact]) -> (Vec<PairOutcome>, Vec<RepetitionCluster>) {
        let mut position: HashMap<&str, usize> = HashMap::with_capacity(facts.len());
        for (i, fact) in facts.iter().enumerate() {
            position.entry(fact.id.as_str()).or_insert(i);
        }

        let mut sets = DisjointSet::new(facts.len());
        let mut near_identical = vec![false; outcomes.len()];
        for (i, outcome) in outcomes.iter().enumerate() {
            if !outcome.is_resolved() || !links_repetition(&outcome.verdict) {
                continue;
            }
            let (Some(&a), Some(&b)) = (
                position.get(outcome.pair.fact_a.as_str()),
                position.get(outcome.pair.fact_b.as_str()),
            ) else {
                continue;
            };
            if self.is_near_identical(&facts[a], &facts[b]) {
                near_identical[i] = true;
                sets.union(a, b);
            }
        }

        let roots: Vec<usize> = (0..facts.len()).map(|i| sets.find(i)).collect();
        let mut groups: IndexMap<usize, BTreeSet<usize>> = IndexMap::new();
        for (i, outcome) in outcomes.iter().enumerate() {
            if !near_identical[i] {
                continue;
            }
            for id in [&outcome.pair.fact_a, &outcome.pair.fact_b] {
                if let Some(&pos) = position.get(id.as_str()) {
                    groups.entry(roots[pos]).or_default().insert(pos);
                }
            }
        }
        groups.retain(|_, members| members.len() >= self.config.min_cluster_size);
        groups.sort_keys();

        if groups.is_empty() {
            return (outcomes, Vec::new());
        }

        let clusters: Vec<RepetitionCluster> = groups
            .values()
            .map(|members| {
                let mut locations: Vec<String> = Vec::new();
                for &pos in members {
                    let location = facts[pos].location.describe();
                    if !locations.contains(&location) {
                        locations.push(location);
                    }
                }
                let first = members.iter().next().copied().unwrap_or_default();
                RepetitionCluster {
                    members: members.iter().map(|&pos| facts[pos].id.clone()).collect(),
                    representative: facts[first].content.clone(),
                    count: members.len(),
                    locations,
                    source: RepetitionSource::Facts,
                }
            })
            .collect();

        // Near-identical pairs inside a reported cluster are represented by the cluster
        let kept: Vec<PairOutcome> = outcomes
            .into_iter()
            .zip(near_identical)
            .filter(|(outcome, folded)| {
                if !*folded {
                    return true;
                }
                position
                    .get(outcome.pair.fact_a.as_str())
                    .map_or(true, |&pos| !groups.contains_key(&roots[pos]))
            })
            .map(|(outcome, _)| outcome)
            .collect();

        ENGINE_METRICS.record_repetition_clusters(clusters.len());
        info!(
            "Repetition pass: {} clusters covering {} facts",
            clusters.len(),
            clusters.iter().map(|c| c.count).sum::<usize>()
        );

        (kept, clusters)
    }

    /// Sentences repeated at least `min_section_occurrences` times across sections
    pub fn detect_section_repetitions(&self, sections: &[Section]) -> Vec<RepetitionCluster> {
        if sections.is_empty() {
            return Vec::new();
        }

        let mut occurrences: IndexMap<String, Vec<String>> = IndexMap::new();
        for section in sections {
            if section.content.is_empty() {
                continue;
            }
            let title = if section.title.trim().is_empty() {
                format!("Section {}", section.index + 1)
            } else {
                section.title.trim().to_string()
            };

            for sentence in section.content.split(SENTENCE_BREAKS) {
                let sentence = sentence.trim();
                if sentence.chars().count() < self.config.min_sentence_chars {
                    continue;
                }
                occurrences.entry(sentence.to_string()).or_default().push(title.clone());
            }
        }

        debug!("Section scan: {} distinct sentences", occurrences.len());

        let clusters: Vec<RepetitionCluster> = occurrences
            .into_iter()
            .filter(|(_, titles)| titles.len() >= self.config.min_section_occurrences)
            .map(|(sentence, titles)| {
                let count = titles.len();
                let locations: BTreeSet<String> = titles.into_iter().collect();
                RepetitionCluster {
                    members: Vec::new(),
                    representative: sentence,
                    count,
                    locations: locations.into_iter().collect(),
                    source: RepetitionSource::Sections,
                }
            })
            .collect();

        if !clusters.is_empty() {
            ENGINE_METRICS.record_repetition_clusters(clusters.len());
            info!("Section scan found {} repeated sentences", clusters.len());
        }
        clusters
    }
}
