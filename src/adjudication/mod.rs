//! Adjudication boundary
//!
//! The decision "conflict or not" is made by an external adjudicator (a
//! language model behind [`LlmAdjudicator`], or any other [`Adjudicator`]).
//! This module owns how candidate pairs are dispatched to it: bounded
//! batches, per-pair failure isolation, cancellation, and the repetition
//! pass that folds near-identical facts into clusters.

pub mod cancel;
pub mod fallback;
pub mod llm;
pub mod orchestrator;
pub mod repetition;
pub mod report;

pub use cancel::CancellationToken;
pub use fallback::FallbackAdjudicator;
pub use llm::LlmAdjudicator;
pub use orchestrator::{Orchestrator, PairOutcome, PairState};
pub use repetition::{RepetitionCluster, RepetitionDetector, RepetitionSource};
pub use report::{ConflictReport, ReportStatistics};

use crate::facts::Fact;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Adjudication errors, always local to one pair
#[derive(Debug, Error)]
pub enum AdjudicationError {
    #[error("Adjudicator unavailable: {0}")]
    Unavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Cancelled before dispatch")]
    Cancelled,

    #[error("Unknown fact id: {0}")]
    UnknownFact(String),

    #[error("All adjudicators failed: {0}")]
    Exhausted(String),

    /// Failure raised by an adjudicator through `anyhow`, e.g. with `?` on a `Context` result
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Category of a judged conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    NoConflict,
    DataInconsistency,
    LogicalContradiction,
    TimeConflict,
    Repetition,
    Unknown,
}

impl VerdictKind {
    /// Parse an English or Chinese label; unrecognized labels are `Unknown`
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "no_conflict" | "none" | "无冲突" | "无" => VerdictKind::NoConflict,
            "data_inconsistency" | "数据不一致" => VerdictKind::DataInconsistency,
            "logical_contradiction" | "contradiction" | "逻辑矛盾" => VerdictKind::LogicalContradiction,
            "time_conflict" | "时间冲突" => VerdictKind::TimeConflict,
            "repetition" | "duplicate" | "重复" | "内容重复" | "核心高频重复" => VerdictKind::Repetition,
            _ => VerdictKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictKind::NoConflict => "no_conflict",
            VerdictKind::DataInconsistency => "data_inconsistency",
            VerdictKind::LogicalContradiction => "logical_contradiction",
            VerdictKind::TimeConflict => "time_conflict",
            VerdictKind::Repetition => "repetition",
            VerdictKind::Unknown => "unknown",
        }
    }
}

/// Severity of a judged conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    /// Parse an English or Chinese label, `None` when unrecognized
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "none" | "无" => Some(Severity::None),
            "low" | "低" => Some(Severity::Low),
            "medium" | "中" => Some(Severity::Medium),
            "high" | "高" => Some(Severity::High),
            _ => None,
        }
    }

    /// Sort rank, most severe first
    pub fn rank(&self) -> u8 {
        match self {
            Severity::High => 0,
            Severity::Medium => 1,
            Severity::Low => 2,
            Severity::None => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// Judgment for one candidate pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub has_conflict_or_repetition: bool,
    pub kind: VerdictKind,
    pub severity: Severity,
    pub explanation: String,
    pub confidence: f32,
}

impl Verdict {
    pub fn no_conflict(explanation: impl Into<String>) -> Self {
        Self {
            has_conflict_or_repetition: false,
            kind: VerdictKind::NoConflict,
            severity: Severity::None,
            explanation: explanation.into(),
            confidence: 0.3,
        }
    }

    pub fn conflict(kind: VerdictKind, severity: Severity, explanation: impl Into<String>, confidence: f32) -> Self {
        Self {
            has_conflict_or_repetition: true,
            kind,
            severity,
            explanation: explanation.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Synthetic verdict recorded for a failed adjudication
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self {
            has_conflict_or_repetition: false,
            kind: VerdictKind::Unknown,
            severity: Severity::None,
            explanation: reason.into(),
            confidence: 0.0,
        }
    }
}

/// External adjudicator capability
#[async_trait]
pub trait Adjudicator: Send + Sync {
    /// Adjudicator name, for logs and error messages
    fn name(&self) -> &str;

    /// Judge whether two facts conflict or repeat each other
    async fn adjudicate(&self, fact_a: &Fact, fact_b: &Fact) -> Result<Verdict, AdjudicationError>;
}
