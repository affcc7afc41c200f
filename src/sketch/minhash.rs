//! Shingling and MinHash signatures

use rand::{rngs::StdRng, Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

const MERSENNE_PRIME: u64 = (1 << 61) - 1;
const MAX_HASH: u64 = (1 << 32) - 1;

/// Set of k-token shingles, ordered for deterministic iteration
pub type ShingleSet = BTreeSet<String>;

/// Sliding windows of `k` consecutive tokens
///
/// Fewer than `k` tokens yields an empty set: such text has no shingle
/// and is excluded from similarity retrieval.
pub fn shingles(tokens: &[String], k: usize) -> ShingleSet {
    if k == 0 || tokens.len() < k {
        return ShingleSet::new();
    }
    tokens.windows(k).map(|w| w.join(" ")).collect()
}

/// Exact Jaccard similarity between two shingle sets
pub fn jaccard(a: &ShingleSet, b: &ShingleSet) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Fixed-length MinHash signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(Vec<u32>);

impl Signature {
    pub fn values(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Estimated Jaccard similarity: fraction of agreeing positions
    pub fn estimate_jaccard(&self, other: &Signature) -> f64 {
        let len = self.0.len().min(other.0.len());
        if len == 0 {
            return 0.0;
        }
        let agreeing = self.0.iter().zip(&other.0).filter(|(a, b)| a == b).count();
        agreeing as f64 / len as f64
    }
}

/// MinHash over a family of `P` universal hash permutations
///
/// Each shingle is hashed once with SHA-256 (truncated to 32 bits), then
/// mapped through `(a * h + b) mod (2^61 - 1)` for every permutation.
#[derive(Debug, Clone)]
pub struct MinHasher {
    permutations: Vec<(u64, u64)>,
}

impl MinHasher {
    /// Create a hasher with `num_perm` permutations drawn from `seed`
    pub fn new(num_perm: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let permutations = (0..num_perm)
            .map(|_| (rng.gen_range(1..MERSENNE_PRIME), rng.gen_range(0..MERSENNE_PRIME)))
            .collect();
        Self { permutations }
    }

    pub fn num_perm(&self) -> usize {
        self.permutations.len()
    }

    /// Signature of a shingle set, or `None` when the set is empty
    pub fn signature(&self, shingles: &ShingleSet) -> Option<Signature> {
        if shingles.is_empty() {
            return None;
        }

        let mut mins = vec![u32::MAX; self.permutations.len()];
        for shingle in shingles {
            let base = base_hash(shingle);
            for (slot, &(a, b)) in mins.iter_mut().zip(&self.permutations) {
                let permuted = ((a as u128 * base as u128 + b as u128) % MERSENNE_PRIME as u128) as u64;
                let value = (permuted & MAX_HASH) as u32;
                if value < *slot {
                    *slot = value;
                }
            }
        }

        Some(Signature(mins))
    }
}

fn base_hash(shingle: &str) -> u64 {
    let digest = Sha256::digest(shingle.as_bytes());
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&digest[..4]);
    u32::from_le_bytes(bytes) as u64
}
