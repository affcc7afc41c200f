//! Conflict report handed to the reporting and storage layer

use super::{PairOutcome, RepetitionCluster};
use crate::candidates::CandidateStats;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Counts over reported conflicts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportStatistics {
    pub by_severity: IndexMap<String, usize>,
    pub by_kind: IndexMap<String, usize>,
    pub by_origin: IndexMap<String, usize>,
    pub repetition_clusters: usize,
}

/// Result of one document-analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictReport {
    pub run_id: Uuid,
    pub document_id: String,
    pub generated_at: DateTime<Utc>,
    pub total_facts: usize,
    pub total_candidates: usize,
    /// Pairs actually sent to the adjudicator
    pub total_comparisons: usize,
    /// Resolved pairs judged to conflict, most severe first
    pub conflicts: Vec<PairOutcome>,
    pub failures: Vec<PairOutcome>,
    pub repetitions: Vec<RepetitionCluster>,
    pub candidate_stats: CandidateStats,
    pub statistics: ReportStatistics,
    pub cancelled: bool,
}

impl ConflictReport {
    /// Report for a run that had nothing to compare
    pub fn empty(document_id: &str, total_facts: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            document_id: document_id.to_string(),
            generated_at: Utc::now(),
            total_facts,
            total_candidates: 0,
            total_comparisons: 0,
            conflicts: Vec::new(),
            failures: Vec::new(),
            repetitions: Vec::new(),
            candidate_stats: CandidateStats::default(),
            statistics: ReportStatistics::default(),
            cancelled: false,
        }
    }

    /// Assemble a report, moving every outcome to the reported state
    pub fn build(
        document_id: &str,
        total_facts: usize,
        candidate_stats: CandidateStats,
        outcomes: Vec<PairOutcome>,
        repetitions: Vec<RepetitionCluster>,
        cancelled: bool,
    ) -> Self {
        let total_comparisons = outcomes.iter().filter(|o| !o.is_cancelled()).count();

        let mut conflicts = Vec::new();
        let mut failures = Vec::new();
        for mut outcome in outcomes {
            outcome.mark_reported();
            if outcome.is_failed() {
                failures.push(outcome);
            } else if outcome.verdict.has_conflict_or_repetition {
                conflicts.push(outcome);
            }
        }
        conflicts.sort_by_key(|o| o.verdict.severity.rank());

        let mut statistics = ReportStatistics {
            repetition_clusters: repetitions.len(),
            ..ReportStatistics::default()
        };
        for outcome in &conflicts {
            *statistics
                .by_severity
                .entry(outcome.verdict.severity.as_str().to_string())
                .or_default() += 1;
            *statistics
                .by_kind
                .entry(outcome.verdict.kind.as_str().to_string())
                .or_default() += 1;
            *statistics
                .by_origin
                .entry(outcome.pair.origin.as_str().to_string())
                .or_default() += 1;
        }

        Self {
            run_id: Uuid::new_v4(),
            document_id: document_id.to_string(),
            generated_at: Utc::now(),
            total_facts,
            total_candidates: candidate_stats.aggregated,
            total_comparisons,
            conflicts,
            failures,
            repetitions,
            candidate_stats,
            statistics,
            cancelled,
        }
    }

    pub fn has_findings(&self) -> bool {
        !self.conflicts.is_empty() || !self.repetitions.is_empty()
    }
}
