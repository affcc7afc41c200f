//! Banded locality-sensitive hashing index over MinHash signatures
//!
//! The index is built in two phases. [`LshIndexBuilder`] accepts
//! insertions only; [`LshIndexBuilder::build`] freezes it into an
//! [`LshIndex`] that accepts queries only, so no query can observe a
//! partially built index.

use super::minhash::Signature;
use crate::config::{validate_layout, ConfigError};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

type Bucket = HashMap<Box<[u32]>, Vec<usize>>;

/// Insertion phase of the index
#[derive(Debug)]
pub struct LshIndexBuilder {
    bands: usize,
    rows: usize,
    buckets: Vec<Bucket>,
    ids: Vec<String>,
    positions: HashMap<String, usize>,
}

impl LshIndexBuilder {
    /// Create an empty index for signatures of `num_perm` values
    pub fn new(bands: usize, rows: usize, num_perm: usize) -> Result<Self, ConfigError> {
        validate_layout(bands, rows, num_perm)?;
        Ok(Self {
            bands,
            rows,
            buckets: (0..bands).map(|_| Bucket::new()).collect(),
            ids: Vec::new(),
            positions: HashMap::new(),
        })
    }

    /// Insert a signature; returns false when the id is already present or
    /// the signature is too short for the band layout
    pub fn insert(&mut self, fact_id: impl Into<String>, signature: &Signature) -> bool {
        let fact_id = fact_id.into();
        if self.positions.contains_key(&fact_id) {
            debug!("LSH insert skipped, duplicate key: {}", fact_id);
            return false;
        }
        if signature.len() < self.bands * self.rows {
            warn!(
                "LSH insert skipped for {}: signature length {} < {}",
                fact_id,
                signature.len(),
                self.bands * self.rows
            );
            return false;
        }

        let position = self.ids.len();
        for (band, bucket) in self.buckets.iter_mut().enumerate() {
            let key = band_slice(signature, band, self.rows);
            bucket.entry(key.into()).or_default().push(position);
        }
        self.positions.insert(fact_id.clone(), position);
        self.ids.push(fact_id);
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Freeze the index for querying
    pub fn build(self) -> LshIndex {
        debug!(
            "LSH index built: {} entries, {} bands x {} rows",
            self.ids.len(),
            self.bands,
            self.rows
        );
        LshIndex {
            bands: self.bands,
            rows: self.rows,
            buckets: self.buckets,
            ids: self.ids,
            positions: self.positions,
        }
    }
}

/// Query phase of the index
#[derive(Debug)]
pub struct LshIndex {
    bands: usize,
    rows: usize,
    buckets: Vec<Bucket>,
    ids: Vec<String>,
    positions: HashMap<String, usize>,
}

impl LshIndex {
    /// Insertion positions of every entry sharing a bucket with `signature`
    /// in at least one band, ascending
    pub fn query_positions(&self, signature: &Signature) -> BTreeSet<usize> {
        let mut found = BTreeSet::new();
        if signature.len() < self.bands * self.rows {
            return found;
        }
        for (band, bucket) in self.buckets.iter().enumerate() {
            if let Some(members) = bucket.get(band_slice(signature, band, self.rows)) {
                found.extend(members.iter().copied());
            }
        }
        found
    }

    /// Ids likely similar to `signature`, in insertion order
    pub fn query(&self, signature: &Signature) -> Vec<&str> {
        self.query_positions(signature)
            .into_iter()
            .map(|position| self.ids[position].as_str())
            .collect()
    }

    pub fn id_at(&self, position: usize) -> Option<&str> {
        self.ids.get(position).map(String::as_str)
    }

    pub fn position_of(&self, fact_id: &str) -> Option<usize> {
        self.positions.get(fact_id).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Occupied buckets per band, for diagnostics
    pub fn bucket_counts(&self) -> Vec<usize> {
        self.buckets.iter().map(HashMap::len).collect()
    }
}

fn band_slice(signature: &Signature, band: usize, rows: usize) -> &[u32] {
    &signature.values()[band * rows..(band + 1) * rows]
}
