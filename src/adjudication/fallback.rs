//! Ordered fallback across several adjudicators

use super::{AdjudicationError, Adjudicator, Verdict};
use crate::facts::Fact;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Tries each adjudicator in order; the first success wins
pub struct FallbackAdjudicator {
    providers: Vec<Arc<dyn Adjudicator>>,
}

impl FallbackAdjudicator {
    pub fn new(providers: Vec<Arc<dyn Adjudicator>>) -> Self {
        Self { providers }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl Adjudicator for FallbackAdjudicator {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn adjudicate(&self, fact_a: &Fact, fact_b: &Fact) -> Result<Verdict, AdjudicationError> {
        if self.providers.is_empty() {
            return Err(AdjudicationError::Unavailable("no adjudicators configured".to_string()));
        }

        let mut failures = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match provider.adjudicate(fact_a, fact_b).await {
                Ok(verdict) => return Ok(verdict),
                Err(e) => {
                    warn!("Adjudicator {} failed for ({}, {}): {}", provider.name(), fact_a.id, fact_b.id, e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        Err(AdjudicationError::Exhausted(failures.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockAdjudicator {
        name: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl MockAdjudicator {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Adjudicator for MockAdjudicator {
        fn name(&self) -> &str {
            self.name
        }

        async fn adjudicate(&self, _a: &Fact, _b: &Fact) -> Result<Verdict, AdjudicationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AdjudicationError::Network("connection refused".to_string()))
            } else {
                Ok(Verdict::no_conflict(self.name))
            }
        }
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let primary = MockAdjudicator::new("primary", true);
        let secondary = MockAdjudicator::new("secondary", false);
        let tertiary = MockAdjudicator::new("tertiary", false);
        let fallback = FallbackAdjudicator::new(vec![primary.clone(), secondary.clone(), tertiary.clone()]);

        let a = Fact::new("a", "x");
        let b = Fact::new("b", "y");
        let verdict = fallback.adjudicate(&a, &b).await.unwrap();

        assert_eq!(verdict.explanation, "secondary");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tertiary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_failures_are_listed() {
        let fallback = FallbackAdjudicator::new(vec![
            MockAdjudicator::new("one", true),
            MockAdjudicator::new("two", true),
        ]);

        let a = Fact::new("a", "x");
        let b = Fact::new("b", "y");
        match fallback.adjudicate(&a, &b).await {
            Err(AdjudicationError::Exhausted(message)) => {
                assert!(message.contains("one: Network error"));
                assert!(message.contains("two: Network error"));
            }
            other => panic!("expected exhausted error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_fallback_is_unavailable() {
        let fallback = FallbackAdjudicator::new(vec![]);
        assert!(fallback.is_empty());
        let result = fallback.adjudicate(&Fact::new("a", "x"), &Fact::new("b", "y")).await;
        assert!(matches!(result, Err(AdjudicationError::Unavailable(_))));
    }
}
