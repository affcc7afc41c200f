//! Error types for the candidate pair engine

use crate::adjudication::AdjudicationError;
use crate::config::ConfigError;
use thiserror::Error;

/// Top-level engine error
///
/// Only configuration problems surface through this type at runtime
/// boundaries; per-fact and per-pair failures are reported as data.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Adjudication error: {0}")]
    Adjudication(#[from] AdjudicationError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
