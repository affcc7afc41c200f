//! Fact records consumed by the candidate pair engine
//!
//! Facts are produced upstream by the extraction stage and are never
//! mutated here. This module only defines their shape and the input
//! screening applied before candidate generation.

pub mod models;

pub use models::{normalize_role, Fact, FactLocation, Modifiers, Polarity, Section, VerifiableType};

use std::collections::HashSet;
use tracing::warn;

/// Facts usable for pairing: non-empty ids, first occurrence of each id
pub fn eligible_facts(facts: &[Fact]) -> Vec<&Fact> {
    let mut seen = HashSet::with_capacity(facts.len());
    let mut eligible = Vec::with_capacity(facts.len());

    for fact in facts {
        if fact.id.trim().is_empty() {
            warn!("Skipping fact without id: {:.40}", fact.content);
            continue;
        }
        if !seen.insert(fact.id.as_str()) {
            warn!("Skipping duplicate fact id: {}", fact.id);
            continue;
        }
        eligible.push(fact);
    }

    eligible
}
