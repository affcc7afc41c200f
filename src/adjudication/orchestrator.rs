//! Batched adjudication of candidate pairs
//!
//! Pairs are dispatched concurrently within a batch; the next batch starts
//! only after every call of the current one has finished. Results keep the
//! order of the input list regardless of completion order.

use super::{AdjudicationError, Adjudicator, CancellationToken, Verdict};
use crate::candidates::CandidatePair;
use crate::config::{ConfigError, OrchestratorConfig};
use crate::facts::Fact;
use crate::metrics::ENGINE_METRICS;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle of one candidate pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairState {
    Pending,
    Dispatched,
    Resolved,
    Failed,
    Reported,
}

impl PairState {
    /// Allowed moves: Pending -> Dispatched -> {Resolved, Failed} -> Reported.
    /// A pending pair may fail directly when the run is cancelled before dispatch.
    pub fn can_transition_to(self, next: PairState) -> bool {
        matches!(
            (self, next),
            (PairState::Pending, PairState::Dispatched)
                | (PairState::Pending, PairState::Failed)
                | (PairState::Dispatched, PairState::Resolved)
                | (PairState::Dispatched, PairState::Failed)
                | (PairState::Resolved, PairState::Reported)
                | (PairState::Failed, PairState::Reported)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PairState::Resolved | PairState::Failed)
    }
}

/// Result of adjudicating one candidate pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairOutcome {
    pub pair: CandidatePair,
    pub state: PairState,
    /// Adjudicator verdict, or a synthetic "unknown" verdict on failure
    pub verdict: Verdict,
    /// Failure reason when the pair failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Zero-based batch the pair belonged to
    pub batch: usize,
    /// False when the run was cancelled before the pair's batch started
    #[serde(default)]
    pub dispatched: bool,
}

impl PairOutcome {
    fn pending(pair: CandidatePair, batch: usize) -> Self {
        Self {
            pair,
            state: PairState::Pending,
            verdict: Verdict::unknown("not adjudicated"),
            error: None,
            batch,
            dispatched: false,
        }
    }

    fn transition(&mut self, next: PairState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            self.dispatched |= next == PairState::Dispatched;
            true
        } else {
            warn!(
                "Ignored invalid transition {:?} -> {:?} for ({}, {})",
                self.state, next, self.pair.fact_a, self.pair.fact_b
            );
            false
        }
    }

    fn resolve(&mut self, verdict: Verdict) {
        if self.transition(PairState::Resolved) {
            self.verdict = verdict;
        }
    }

    fn fail(&mut self, error: &AdjudicationError) {
        if self.transition(PairState::Failed) {
            let reason = error.to_string();
            self.verdict = Verdict::unknown(reason.clone());
            self.error = Some(reason);
        }
    }

    /// Hand the outcome to the reporting layer
    pub fn mark_reported(&mut self) -> bool {
        self.transition(PairState::Reported)
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.is_failed() && !self.dispatched
    }

    pub fn is_resolved(&self) -> bool {
        self.error.is_none() && matches!(self.state, PairState::Resolved | PairState::Reported)
    }
}

/// Dispatches candidate pairs to an adjudicator in bounded batches
pub struct Orchestrator {
    adjudicator: Arc<dyn Adjudicator>,
    batch_size: usize,
    call_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(adjudicator: Arc<dyn Adjudicator>, config: &OrchestratorConfig) -> Result<Self, ConfigError> {
        if config.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.batch_size",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            adjudicator,
            batch_size: config.batch_size,
            call_timeout: config.call_timeout(),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Adjudicate every pair, one outcome per input pair in input order
    ///
    /// Failures stay local to their pair. Once `cancel` fires no further
    /// batch is started; pairs that were never dispatched fail with a
    /// cancellation reason.
    pub async fn adjudicate_all(
        &self,
        pairs: &[CandidatePair],
        facts: &[Fact],
        cancel: &CancellationToken,
    ) -> Vec<PairOutcome> {
        let mut lookup: HashMap<&str, &Fact> = HashMap::with_capacity(facts.len());
        for fact in facts {
            lookup.entry(fact.id.as_str()).or_insert(fact);
        }

        let total_batches = pairs.len().div_ceil(self.batch_size);
        let mut outcomes = Vec::with_capacity(pairs.len());
        let mut undispatched = 0usize;

        for (batch_index, chunk) in pairs.chunks(self.batch_size).enumerate() {
            let mut batch: Vec<PairOutcome> = chunk
                .iter()
                .map(|pair| PairOutcome::pending(pair.clone(), batch_index))
                .collect();

            if cancel.is_cancelled() {
                for outcome in &mut batch {
                    outcome.fail(&AdjudicationError::Cancelled);
                    ENGINE_METRICS.record_adjudication("cancelled");
                }
                undispatched += batch.len();
                outcomes.extend(batch);
                continue;
            }

            debug!(
                "Dispatching batch {}/{} ({} pairs) to {}",
                batch_index + 1,
                total_batches,
                chunk.len(),
                self.adjudicator.name()
            );

            for outcome in &mut batch {
                outcome.transition(PairState::Dispatched);
            }

            let started = Instant::now();
            let results = join_all(chunk.iter().map(|pair| self.call(pair, &lookup))).await;
            ENGINE_METRICS.record_batch(started.elapsed().as_secs_f64());

            let mut failed = 0usize;
            for (outcome, result) in batch.iter_mut().zip(results) {
                match result {
                    Ok(verdict) => {
                        outcome.resolve(verdict);
                        ENGINE_METRICS.record_adjudication("resolved");
                    }
                    Err(e) => {
                        warn!(
                            "Adjudication failed for ({}, {}): {}",
                            outcome.pair.fact_a, outcome.pair.fact_b, e
                        );
                        outcome.fail(&e);
                        ENGINE_METRICS.record_adjudication("failed");
                        failed += 1;
                    }
                }
            }

            info!(
                "Batch {}/{} done in {:?}: {} resolved, {} failed",
                batch_index + 1,
                total_batches,
                started.elapsed(),
                batch.len() - failed,
                failed
            );
            outcomes.extend(batch);
        }

        if undispatched > 0 {
            warn!("Adjudication cancelled: {} pairs not dispatched", undispatched);
        }

        outcomes
    }

    async fn call(&self, pair: &CandidatePair, lookup: &HashMap<&str, &Fact>) -> Result<Verdict, AdjudicationError> {
        let fact_a = lookup
            .get(pair.fact_a.as_str())
            .ok_or_else(|| AdjudicationError::UnknownFact(pair.fact_a.clone()))?;
        let fact_b = lookup
            .get(pair.fact_b.as_str())
            .ok_or_else(|| AdjudicationError::UnknownFact(pair.fact_b.clone()))?;

        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, self.adjudicator.adjudicate(fact_a, fact_b))
                .await
                .map_err(|_| AdjudicationError::Timeout(limit))?,
            None => self.adjudicator.adjudicate(fact_a, fact_b).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjudication::{Severity, VerdictKind};
    use crate::candidates::PairOrigin;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sleeps `delay_ms` per call, fails for ids listed in `failing`
    struct MockAdjudicator {
        delay_ms: u64,
        failing: Vec<&'static str>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        cancel_on_call: Option<CancellationToken>,
    }

    impl MockAdjudicator {
        fn new(delay_ms: u64) -> Self {
            Self {
                delay_ms,
                failing: vec![],
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                cancel_on_call: None,
            }
        }
    }

    #[async_trait]
    impl Adjudicator for MockAdjudicator {
        fn name(&self) -> &str {
            "mock"
        }

        async fn adjudicate(&self, fact_a: &Fact, fact_b: &Fact) -> Result<Verdict, AdjudicationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(ref token) = self.cancel_on_call {
                token.cancel();
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.iter().any(|id| *id == fact_a.id) {
                return Err(AdjudicationError::Network(format!("boom on {}", fact_a.id)));
            }
            Ok(Verdict::conflict(
                VerdictKind::DataInconsistency,
                Severity::Low,
                format!("{} vs {}", fact_a.id, fact_b.id),
                0.7,
            ))
        }
    }

    fn fixture(n: usize) -> (Vec<Fact>, Vec<CandidatePair>) {
        let facts: Vec<Fact> = (0..=n).map(|i| Fact::new(format!("f{}", i), format!("fact {}", i))).collect();
        let pairs = (0..n)
            .map(|i| CandidatePair::new(&format!("f{}", i), &format!("f{}", i + 1), PairOrigin::Similarity))
            .collect();
        (facts, pairs)
    }

    fn orchestrator(adjudicator: Arc<dyn Adjudicator>, batch_size: usize) -> Orchestrator {
        let config = OrchestratorConfig {
            batch_size,
            call_timeout_ms: None,
        };
        Orchestrator::new(adjudicator, &config).unwrap()
    }

    #[test]
    fn test_state_transitions() {
        assert!(PairState::Pending.can_transition_to(PairState::Dispatched));
        assert!(PairState::Dispatched.can_transition_to(PairState::Failed));
        assert!(PairState::Resolved.can_transition_to(PairState::Reported));
        assert!(!PairState::Pending.can_transition_to(PairState::Resolved));
        assert!(!PairState::Reported.can_transition_to(PairState::Pending));
        assert!(PairState::Failed.is_terminal());
        assert!(!PairState::Dispatched.is_terminal());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = OrchestratorConfig {
            batch_size: 0,
            call_timeout_ms: None,
        };
        assert!(Orchestrator::new(Arc::new(MockAdjudicator::new(0)), &config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_isolated_and_batch_runs_concurrently() {
        let mut mock = MockAdjudicator::new(100);
        mock.failing = vec!["f3"];
        let orchestrator = orchestrator(Arc::new(mock), 10);
        let (facts, pairs) = fixture(10);

        let started = tokio::time::Instant::now();
        let outcomes = orchestrator
            .adjudicate_all(&pairs, &facts, &CancellationToken::new())
            .await;
        let elapsed = started.elapsed();

        assert_eq!(outcomes.len(), 10);
        assert_eq!(outcomes.iter().filter(|o| o.is_failed()).count(), 1);
        assert_eq!(outcomes[3].state, PairState::Failed);
        assert_eq!(outcomes[3].verdict.kind, VerdictKind::Unknown);
        assert!(outcomes[3].error.as_deref().unwrap_or_default().contains("boom on f3"));
        assert!(outcomes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 3)
            .all(|(_, o)| o.state == PairState::Resolved));

        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_results_keep_dispatch_order() {
        let orchestrator = orchestrator(Arc::new(MockAdjudicator::new(0)), 4);
        let (facts, pairs) = fixture(9);

        let outcomes = orchestrator
            .adjudicate_all(&pairs, &facts, &CancellationToken::new())
            .await;

        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.pair, pairs[i]);
            assert_eq!(outcome.verdict.explanation, format!("f{} vs f{}", i, i + 1));
            assert_eq!(outcome.batch, i / 4);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bounded_by_batch_size() {
        let mock = Arc::new(MockAdjudicator::new(50));
        let orchestrator = orchestrator(mock.clone(), 3);
        let (facts, pairs) = fixture(7);

        orchestrator
            .adjudicate_all(&pairs, &facts, &CancellationToken::new())
            .await;

        assert_eq!(mock.calls.load(Ordering::SeqCst), 7);
        assert_eq!(mock.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_new_batches() {
        let token = CancellationToken::new();
        let mut mock = MockAdjudicator::new(0);
        mock.cancel_on_call = Some(token.clone());
        let mock = Arc::new(mock);
        let orchestrator = orchestrator(mock.clone(), 2);
        let (facts, pairs) = fixture(6);

        let outcomes = orchestrator.adjudicate_all(&pairs, &facts, &token).await;

        assert_eq!(outcomes.len(), 6);
        assert_eq!(mock.calls.load(Ordering::SeqCst), 2);
        assert!(outcomes[..2].iter().all(|o| o.state == PairState::Resolved));
        assert!(outcomes[2..].iter().all(|o| o.state == PairState::Failed));
        assert!(outcomes[2..]
            .iter()
            .all(|o| o.error.as_deref() == Some("Cancelled before dispatch")));
        assert!(outcomes[2..].iter().all(PairOutcome::is_cancelled));
        assert!(!outcomes[0].is_cancelled());
        assert!(outcomes.iter().all(|o| o.state != PairState::Dispatched));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_fails_pair() {
        let config = OrchestratorConfig {
            batch_size: 5,
            call_timeout_ms: Some(20),
        };
        let orchestrator = Orchestrator::new(Arc::new(MockAdjudicator::new(100)), &config).unwrap();
        let (facts, pairs) = fixture(2);

        let outcomes = orchestrator
            .adjudicate_all(&pairs, &facts, &CancellationToken::new())
            .await;

        assert!(outcomes.iter().all(|o| o.is_failed()));
        assert!(outcomes[0].error.as_deref().unwrap_or_default().starts_with("Timeout"));
    }

    #[tokio::test]
    async fn test_unknown_fact_fails_only_that_pair() {
        let orchestrator = orchestrator(Arc::new(MockAdjudicator::new(0)), 10);
        let (facts, mut pairs) = fixture(2);
        pairs.push(CandidatePair::new("f0", "ghost", PairOrigin::Keyword));

        let outcomes = orchestrator
            .adjudicate_all(&pairs, &facts, &CancellationToken::new())
            .await;

        assert!(outcomes[0].is_resolved());
        assert!(outcomes[1].is_resolved());
        assert_eq!(outcomes[2].error.as_deref(), Some("Unknown fact id: ghost"));
    }

    #[tokio::test]
    async fn test_mark_reported() {
        let orchestrator = orchestrator(Arc::new(MockAdjudicator::new(0)), 10);
        let (facts, pairs) = fixture(1);
        let mut outcomes = orchestrator
            .adjudicate_all(&pairs, &facts, &CancellationToken::new())
            .await;

        assert!(outcomes[0].mark_reported());
        assert_eq!(outcomes[0].state, PairState::Reported);
        assert!(outcomes[0].is_resolved());
        assert!(!outcomes[0].mark_reported());
    }
}
