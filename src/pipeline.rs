//! End-to-end conflict detection for one document

use crate::adjudication::{
    Adjudicator, CancellationToken, ConflictReport, LlmAdjudicator, Orchestrator, RepetitionDetector,
};
use crate::candidates::{CandidateEngine, CandidateSet};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::facts::{eligible_facts, Fact, Section};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Candidate generation, adjudication and repetition folding
pub struct ConflictPipeline {
    config: EngineConfig,
    candidates: CandidateEngine,
    orchestrator: Orchestrator,
    repetition: RepetitionDetector,
}

impl ConflictPipeline {
    pub fn new(config: EngineConfig, adjudicator: Arc<dyn Adjudicator>) -> Result<Self> {
        config.validate()?;
        let candidates = CandidateEngine::new(&config)?;
        let orchestrator = Orchestrator::new(adjudicator, &config.orchestrator)?;
        let repetition = RepetitionDetector::new(&config.repetition);

        Ok(Self {
            config,
            candidates,
            orchestrator,
            repetition,
        })
    }

    /// Pipeline backed by the configured LLM endpoint
    pub fn with_llm(config: EngineConfig) -> Result<Self> {
        let adjudicator = Arc::new(LlmAdjudicator::new(config.llm.clone())?);
        Self::new(config, adjudicator)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bounded candidate list, usable without adjudication
    pub fn generate_candidates(&self, facts: &[Fact]) -> CandidateSet {
        self.candidates.generate(facts)
    }

    /// Run the whole flow for one document
    ///
    /// Fewer than two eligible facts yields an empty report without calling
    /// the adjudicator. Per-pair failures end up in `failures`; the run
    /// itself never fails.
    pub async fn run(
        &self,
        document_id: &str,
        facts: &[Fact],
        sections: &[Section],
        cancel: &CancellationToken,
    ) -> ConflictReport {
        let started = Instant::now();
        if eligible_facts(facts).len() < 2 {
            info!("Document {}: not enough facts to compare ({})", document_id, facts.len());
            return ConflictReport::empty(document_id, facts.len());
        }

        info!("Document {}: conflict detection over {} facts", document_id, facts.len());

        let candidates = self.candidates.generate(facts);
        let outcomes = self
            .orchestrator
            .adjudicate_all(&candidates.pairs, facts, cancel)
            .await;

        let (outcomes, mut repetitions) = self.repetition.cluster(outcomes, facts);
        if !sections.is_empty() {
            repetitions.extend(self.repetition.detect_section_repetitions(sections));
        }

        let cancelled = cancel.is_cancelled();
        if cancelled {
            warn!("Document {}: run cancelled, report is partial", document_id);
        }

        let report = ConflictReport::build(
            document_id,
            facts.len(),
            candidates.stats,
            outcomes,
            repetitions,
            cancelled,
        );

        info!(
            "Document {}: {} conflicts, {} failures, {} repetition clusters in {:?}",
            document_id,
            report.conflicts.len(),
            report.failures.len(),
            report.repetitions.len(),
            started.elapsed()
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjudication::{AdjudicationError, Severity, Verdict, VerdictKind};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAdjudicator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Adjudicator for CountingAdjudicator {
        fn name(&self) -> &str {
            "counting"
        }

        async fn adjudicate(&self, _a: &Fact, _b: &Fact) -> std::result::Result<Verdict, AdjudicationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Verdict::conflict(
                VerdictKind::DataInconsistency,
                Severity::Medium,
                "values differ",
                0.6,
            ))
        }
    }

    fn counting() -> Arc<CountingAdjudicator> {
        Arc::new(CountingAdjudicator {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_single_fact_skips_adjudication() {
        let adjudicator = counting();
        let pipeline = ConflictPipeline::new(EngineConfig::default(), adjudicator.clone()).unwrap();
        let facts = vec![Fact::new("a", "revenue was 10 million")];

        let report = pipeline.run("doc", &facts, &[], &CancellationToken::new()).await;

        assert_eq!(report.total_facts, 1);
        assert_eq!(report.total_comparisons, 0);
        assert_eq!(adjudicator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_structural_conflict_reported() {
        let adjudicator = counting();
        let pipeline = ConflictPipeline::new(EngineConfig::default(), adjudicator.clone()).unwrap();
        let facts = vec![
            Fact::new("a", "revenue was $10M, Q1")
                .with_triple("revenue", "was", "")
                .with_value(10.0, None),
            Fact::new("b", "revenue was $15M, Q1")
                .with_triple("revenue", "was", "")
                .with_value(15.0, None),
        ];

        let report = pipeline.run("doc", &facts, &[], &CancellationToken::new()).await;

        assert_eq!(report.total_candidates, 1);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.statistics.by_origin.get("structural"), Some(&1));
        assert_eq!(adjudicator.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut config = EngineConfig::default();
        config.lsh.bands = 64;
        config.lsh.rows = 4;
        assert!(ConflictPipeline::new(config, counting()).is_err());
    }
}
