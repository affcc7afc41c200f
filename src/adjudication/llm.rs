//! LLM-backed adjudicator over an OpenAI-compatible chat completions API

use super::{AdjudicationError, Adjudicator, Severity, Verdict, VerdictKind};
use crate::config::LlmConfig;
use crate::facts::{Fact, Polarity};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are a meticulous document reviewer. Decide whether two facts extracted \
from the same document conflict with or repeat each other. Avoid false positives.";

/// Adjudicator that asks a language model to compare two facts
pub struct LlmAdjudicator {
    client: Client,
    config: LlmConfig,
    api_key: Option<SecretString>,
}

impl LlmAdjudicator {
    /// Create an adjudicator, reading the API key from `config.api_key_env`
    pub fn new(config: LlmConfig) -> Result<Self, AdjudicationError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::new);
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: LlmConfig, api_key: Option<SecretString>) -> Result<Self, AdjudicationError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AdjudicationError::Unavailable(e.to_string()))?;

        Ok(Self { client, config, api_key })
    }

    fn build_prompt(&self, fact_a: &Fact, fact_b: &Fact) -> String {
        format!(
            "{}\n\n{}\n\n\
             Decide whether these facts conflict (data inconsistency, logical contradiction, \
             time conflict) or repeat each other.\n\n\
             Reply with a single line of JSON and nothing else:\n\
             {{\"has_conflict\": true or false, \"conflict_type\": \"no_conflict/data_inconsistency/\
             logical_contradiction/time_conflict/repetition\", \"severity\": \"none/low/medium/high\", \
             \"explanation\": \"short reason\", \"confidence\": 0.5}}",
            describe_fact("A", fact_a),
            describe_fact("B", fact_b),
        )
    }

    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String, AdjudicationError> {
        let mut last_error = None;
        let attempts = self.config.max_retries + 1;

        for attempt in 0..attempts {
            if attempt > 0 {
                debug!("Retry attempt {} for adjudication", attempt);
                tokio::time::sleep(self.config.retry_backoff() * 2u32.pow(attempt as u32 - 1)).await;
            }

            let mut req = self.client.post(&self.config.endpoint).json(request);
            if let Some(ref api_key) = self.api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key.expose_secret()));
            }

            match req.send().await {
                Ok(response) => {
                    if !response.status().is_success() {
                        let status = response.status().as_u16();
                        let body = response.text().await.unwrap_or_default();
                        last_error = Some(AdjudicationError::Api { status, body });
                        continue;
                    }

                    match response.json::<ChatCompletionResponse>().await {
                        Ok(resp) => match resp.choices.into_iter().next() {
                            Some(choice) => return Ok(choice.message.content),
                            None => {
                                last_error =
                                    Some(AdjudicationError::InvalidResponse("No choices in response".to_string()));
                            }
                        },
                        Err(e) => {
                            last_error = Some(AdjudicationError::InvalidResponse(format!(
                                "Failed to parse response: {}",
                                e
                            )));
                        }
                    }
                }
                Err(e) if e.is_timeout() => {
                    last_error = Some(AdjudicationError::Timeout(self.config.timeout()));
                }
                Err(e) => {
                    last_error = Some(AdjudicationError::Network(e.to_string()));
                }
            }
        }

        warn!("Adjudication request failed after {} attempts", attempts);
        Err(last_error.unwrap_or_else(|| AdjudicationError::Unavailable(self.config.endpoint.clone())))
    }
}

#[async_trait]
impl Adjudicator for LlmAdjudicator {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn adjudicate(&self, fact_a: &Fact, fact_b: &Fact) -> Result<Verdict, AdjudicationError> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: self.build_prompt(fact_a, fact_b),
                },
            ],
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
        };

        let content = self.complete(&request).await?;
        parse_verdict(&content)
    }
}

/// Prompt block for one fact with its structured fields; blanks render as "-"
fn describe_fact(label: &str, fact: &Fact) -> String {
    let or_dash = |text: &str| match text.trim() {
        "" => "-".to_string(),
        trimmed => trimmed.to_string(),
    };
    let value = match (fact.value, fact.modifiers.unit.as_deref()) {
        (Some(value), Some(unit)) => format!("{} {}", value, unit.trim()),
        (Some(value), None) => value.to_string(),
        (None, _) => "-".to_string(),
    };
    let polarity = match fact.polarity {
        Polarity::Affirmative => "affirmative",
        Polarity::Negative => "negative",
    };

    format!(
        "Fact {}: {}\n\
         (type: {} | location: {})\n\
         (subject: {} | predicate: {} | object: {})\n\
         (value: {} | time: {} | polarity: {})\n\
         original text: {}",
        label,
        fact.content,
        fact.fact_type.as_deref().unwrap_or("unknown"),
        fact.location.describe(),
        or_dash(&fact.subject),
        or_dash(&fact.predicate),
        or_dash(&fact.object),
        value,
        or_dash(fact.time.as_deref().unwrap_or_default()),
        polarity,
        or_dash(&fact.original_text),
    )
}

/// Parse a model reply into a verdict
///
/// Markdown fences are stripped and whitespace collapsed before parsing.
/// Missing fields fall back to defaults that depend on `has_conflict`.
pub fn parse_verdict(raw: &str) -> Result<Verdict, AdjudicationError> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let value: Value = serde_json::from_str(&collapsed).map_err(|e| {
        let preview: String = collapsed.chars().take(200).collect();
        debug!("Unparseable adjudication reply: {}", preview);
        AdjudicationError::InvalidResponse(format!("Failed to parse verdict JSON: {}", e))
    })?;
    let object = value
        .as_object()
        .ok_or_else(|| AdjudicationError::InvalidResponse("Verdict is not a JSON object".to_string()))?;

    let has_conflict = object
        .get("has_conflict")
        .or_else(|| object.get("has_conflict_or_repetition"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let kind = match object.get("conflict_type").and_then(Value::as_str) {
        Some(label) => VerdictKind::from_label(label),
        None if has_conflict => VerdictKind::Unknown,
        None => VerdictKind::NoConflict,
    };

    let default_severity = if has_conflict { Severity::Medium } else { Severity::None };
    let severity = object
        .get("severity")
        .and_then(Value::as_str)
        .and_then(Severity::from_label)
        .unwrap_or(default_severity);

    let explanation = object
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let default_confidence = if has_conflict { 0.5 } else { 0.3 };
    let confidence = object
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c as f32)
        .unwrap_or(default_confidence)
        .clamp(0.0, 1.0);

    Ok(Verdict {
        has_conflict_or_repetition: has_conflict,
        kind,
        severity,
        explanation,
        confidence,
    })
}

// OpenAI-compatible API types
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
