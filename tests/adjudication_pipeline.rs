//! Integration tests for batched adjudication and the full pipeline
//!
//! Scripted adjudicators stand in for the language model; one test drives
//! the real HTTP adjudicator against a mockito server.

use async_trait::async_trait;
use fact_conflict_engine::adjudication::{
    AdjudicationError, Adjudicator, CancellationToken, FallbackAdjudicator, LlmAdjudicator, Orchestrator, PairState,
    RepetitionSource, Severity, Verdict, VerdictKind,
};
use fact_conflict_engine::candidates::{CandidatePair, PairOrigin};
use fact_conflict_engine::config::{EngineConfig, OrchestratorConfig};
use fact_conflict_engine::facts::{Fact, Section};
use fact_conflict_engine::pipeline::ConflictPipeline;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Per-fact delays and failures, keyed on the first fact of the pair
#[derive(Default)]
struct ScriptedAdjudicator {
    delays_ms: HashMap<String, u64>,
    failing: Vec<String>,
    verdict: Option<Verdict>,
    calls: AtomicUsize,
}

#[async_trait]
impl Adjudicator for ScriptedAdjudicator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn adjudicate(&self, fact_a: &Fact, _fact_b: &Fact) -> Result<Verdict, AdjudicationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays_ms.get(&fact_a.id).copied().unwrap_or(10);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if self.failing.contains(&fact_a.id) {
            return Err(AdjudicationError::Api {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(self.verdict.clone().unwrap_or_else(|| Verdict::no_conflict("consistent")))
    }
}

fn chain(n: usize) -> (Vec<Fact>, Vec<CandidatePair>) {
    let facts: Vec<Fact> = (0..=n)
        .map(|i| Fact::new(format!("p{}", i), format!("statement number {}", i)))
        .collect();
    let pairs = (0..n)
        .map(|i| CandidatePair::new(&format!("p{}", i), &format!("p{}", i + 1), PairOrigin::Structural))
        .collect();
    (facts, pairs)
}

#[tokio::test(start_paused = true)]
async fn test_batch_of_ten_with_one_failure() {
    let mut adjudicator = ScriptedAdjudicator::default();
    for i in 0..10 {
        adjudicator.delays_ms.insert(format!("p{}", i), 20 + 10 * i as u64);
    }
    adjudicator.failing.push("p3".to_string());

    let orchestrator = Orchestrator::new(Arc::new(adjudicator), &OrchestratorConfig::default()).unwrap();
    let (facts, pairs) = chain(10);

    let started = tokio::time::Instant::now();
    let outcomes = orchestrator
        .adjudicate_all(&pairs, &facts, &CancellationToken::new())
        .await;
    let elapsed = started.elapsed();

    assert_eq!(outcomes.len(), 10);
    assert_eq!(outcomes[3].state, PairState::Failed);
    assert_eq!(outcomes[3].verdict.kind, VerdictKind::Unknown);
    assert_eq!(
        outcomes.iter().filter(|o| o.state == PairState::Resolved).count(),
        9
    );

    // Slowest call is 110ms; sequential dispatch would take 650ms
    assert!(elapsed >= Duration::from_millis(110));
    assert!(elapsed < Duration::from_millis(200), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_batches_run_one_after_another() {
    let adjudicator = ScriptedAdjudicator::default();
    let config = OrchestratorConfig {
        batch_size: 4,
        call_timeout_ms: None,
    };
    let orchestrator = Orchestrator::new(Arc::new(adjudicator), &config).unwrap();
    let (facts, pairs) = chain(10);

    let started = tokio::time::Instant::now();
    let outcomes = orchestrator
        .adjudicate_all(&pairs, &facts, &CancellationToken::new())
        .await;

    // Three batches of 10ms calls
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(30));
    assert!(elapsed < Duration::from_millis(40), "elapsed {:?}", elapsed);
    assert_eq!(outcomes.iter().map(|o| o.batch).max(), Some(2));
}

#[tokio::test]
async fn test_three_near_identical_facts_reported_once() {
    let statement = "Our mission is to deliver reliable clean water to every rural household in the region";
    let facts = vec![
        Fact::new("m1", statement).with_location(0, Some("Mission")),
        Fact::new("m2", statement).with_location(3, Some("Strategy")),
        Fact::new("m3", format!("{}.", statement)).with_location(7, Some("Conclusion")),
        Fact::new("r1", "Revenue grew to 12 million in the last fiscal year"),
    ];

    let adjudicator = Arc::new(ScriptedAdjudicator {
        verdict: Some(Verdict::conflict(
            VerdictKind::Repetition,
            Severity::Low,
            "same statement repeated",
            0.9,
        )),
        ..ScriptedAdjudicator::default()
    });
    let pipeline = ConflictPipeline::new(EngineConfig::default(), adjudicator).unwrap();

    let report = pipeline.run("doc-rep", &facts, &[], &CancellationToken::new()).await;

    let clusters: Vec<_> = report
        .repetitions
        .iter()
        .filter(|c| c.source == RepetitionSource::Facts)
        .collect();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].count, 3);
    assert_eq!(clusters[0].members, vec!["m1", "m2", "m3"]);
    assert!(report
        .conflicts
        .iter()
        .all(|o| !o.pair.fact_a.starts_with('m') || !o.pair.fact_b.starts_with('m')));
}

#[tokio::test]
async fn test_section_repetitions_in_report() {
    let tagline = "Building resilient supply chains for the next generation";
    let sections: Vec<Section> = ["Intro", "Strategy", "Outlook"]
        .iter()
        .enumerate()
        .map(|(i, title)| Section::new(i, title, &format!("{}. Section body {}.", tagline, i)))
        .collect();
    let facts = vec![
        Fact::new("a", "The project is fully compliant with environmental rules"),
        Fact::new("b", "The project does not meet the updated guideline on emissions"),
    ];

    let pipeline = ConflictPipeline::new(EngineConfig::default(), Arc::new(ScriptedAdjudicator::default())).unwrap();
    let report = pipeline.run("doc-sec", &facts, &sections, &CancellationToken::new()).await;

    let scanned: Vec<_> = report
        .repetitions
        .iter()
        .filter(|c| c.source == RepetitionSource::Sections)
        .collect();
    assert_eq!(scanned.len(), 1);
    assert_eq!(scanned[0].representative, tagline);
    assert_eq!(scanned[0].count, 3);
}

#[tokio::test]
async fn test_cancelled_run_fails_every_pair() {
    let adjudicator = Arc::new(ScriptedAdjudicator::default());
    let pipeline = ConflictPipeline::new(EngineConfig::default(), adjudicator.clone()).unwrap();
    let facts = vec![
        Fact::new("a", "revenue was $10M, Q1")
            .with_triple("revenue", "was", "")
            .with_value(10.0, None),
        Fact::new("b", "revenue was $15M, Q1")
            .with_triple("revenue", "was", "")
            .with_value(15.0, None),
    ];

    let token = CancellationToken::new();
    token.cancel();
    let report = pipeline.run("doc-cancel", &facts, &[], &token).await;

    assert!(report.cancelled);
    assert_eq!(report.total_comparisons, 0);
    assert_eq!(report.failures.len(), report.total_candidates);
    assert!(report.failures.iter().all(|o| o.is_cancelled()));
    assert_eq!(adjudicator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pipeline_against_mock_llm() {
    let mut server = mockito::Server::new_async().await;
    let reply = serde_json::json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": "```json\n{\"has_conflict\": true, \"conflict_type\": \"数据不一致\", \"severity\": \"高\", \"explanation\": \"10M vs 15M\", \"confidence\": 0.95}\n```"
            }
        }]
    });
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(reply.to_string())
        .expect(1)
        .create_async()
        .await;

    let mut config = EngineConfig::default();
    config.llm.endpoint = format!("{}/v1/chat/completions", server.url());
    let adjudicator = LlmAdjudicator::with_api_key(config.llm.clone(), None).unwrap();
    let pipeline = ConflictPipeline::new(config, Arc::new(adjudicator)).unwrap();

    let facts = vec![
        Fact::new("a", "revenue was $10M, Q1")
            .with_triple("revenue", "was", "")
            .with_value(10.0, None),
        Fact::new("b", "revenue was $15M, Q1")
            .with_triple("revenue", "was", "")
            .with_value(15.0, None),
    ];
    let report = pipeline.run("doc-llm", &facts, &[], &CancellationToken::new()).await;

    mock.assert_async().await;
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].verdict.kind, VerdictKind::DataInconsistency);
    assert_eq!(report.conflicts[0].verdict.severity, Severity::High);
    assert_eq!(report.statistics.by_severity.get("high"), Some(&1));
}

#[test]
fn test_fallback_recovers_from_primary_outage() {
    let primary = Arc::new(ScriptedAdjudicator {
        failing: vec!["a".to_string()],
        ..ScriptedAdjudicator::default()
    });
    let secondary = Arc::new(ScriptedAdjudicator::default());
    let fallback = FallbackAdjudicator::new(vec![primary.clone(), secondary.clone()]);

    let verdict = tokio_test::block_on(fallback.adjudicate(&Fact::new("a", "x"), &Fact::new("b", "y"))).unwrap();

    assert!(!verdict.has_conflict_or_repetition);
    assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
}
