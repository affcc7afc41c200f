//! Fact conflict engine
//!
//! Finds pairs of facts extracted from one document that may contradict or
//! repeat each other without comparing every pair: structural buckets,
//! keyword contradiction patterns and MinHash LSH retrieval produce a
//! bounded candidate list, which is adjudicated in concurrent batches.

pub mod adjudication;
pub mod candidates;
pub mod config;
pub mod error;
pub mod facts;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod sketch;

pub use adjudication::{
    Adjudicator, AdjudicationError, CancellationToken, ConflictReport, FallbackAdjudicator, LlmAdjudicator,
    Orchestrator, PairOutcome, PairState, RepetitionCluster, Severity, Verdict, VerdictKind,
};
pub use candidates::{CandidateEngine, CandidatePair, CandidateSet, ConflictHint, PairOrigin};
pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, Result};
pub use facts::{Fact, Polarity, Section};
pub use logging::init_logging;
pub use pipeline::ConflictPipeline;
pub use sketch::{LshIndex, LshIndexBuilder, MinHasher, Signature, Sketcher};
