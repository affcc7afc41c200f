//! Engine configuration
//!
//! Every knob has a documented default. Sections can be loaded from a TOML
//! file layered under `FCE__`-prefixed environment variables, or overridden
//! individually through [`EngineConfig::from_env`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
///
/// These are fatal at construction time: they describe a defect in how the
/// engine was set up, never a condition of the input data.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("LSH layout {bands} bands x {rows} rows exceeds signature length {num_perm}")]
    BandLayout {
        bands: usize,
        rows: usize,
        num_perm: usize,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub sketch: SketchConfig,

    #[serde(default)]
    pub lsh: LshConfig,

    #[serde(default)]
    pub structural: StructuralConfig,

    #[serde(default)]
    pub keyword: KeywordConfig,

    #[serde(default)]
    pub aggregator: AggregatorConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub repetition: RepetitionConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tokenizer, shingle and MinHash settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SketchConfig {
    /// Tokens per shingle (k)
    #[serde(default = "default_shingle_size")]
    pub shingle_size: usize,

    /// MinHash permutation count (P)
    #[serde(default = "default_num_perm")]
    pub num_perm: usize,

    /// Seed for the permutation family
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Tokens shorter than this many characters are dropped
    #[serde(default = "default_min_token_chars")]
    pub min_token_chars: usize,
}

fn default_shingle_size() -> usize {
    2
}

fn default_num_perm() -> usize {
    128
}

fn default_seed() -> u64 {
    1
}

fn default_min_token_chars() -> usize {
    2
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            shingle_size: default_shingle_size(),
            num_perm: default_num_perm(),
            seed: default_seed(),
            min_token_chars: default_min_token_chars(),
        }
    }
}

/// LSH banding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LshConfig {
    /// Number of bands (b)
    #[serde(default = "default_bands")]
    pub bands: usize,

    /// Rows per band (r)
    #[serde(default = "default_rows")]
    pub rows: usize,

    /// When set, bands/rows are derived from this Jaccard threshold instead
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Cap on similarity-derived pairs
    #[serde(default = "default_max_similarity_pairs")]
    pub max_similarity_pairs: usize,
}

fn default_bands() -> usize {
    32
}

fn default_rows() -> usize {
    4
}

fn default_max_similarity_pairs() -> usize {
    300
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            bands: default_bands(),
            rows: default_rows(),
            threshold: None,
            max_similarity_pairs: default_max_similarity_pairs(),
        }
    }
}

impl LshConfig {
    /// Effective (bands, rows) layout for a signature of `num_perm` values
    pub fn layout(&self, num_perm: usize) -> (usize, usize) {
        match self.threshold {
            Some(threshold) => layout_for_threshold(threshold, num_perm),
            None => (self.bands, self.rows),
        }
    }

    /// Approximate Jaccard similarity at which retrieval probability is 50%
    pub fn approximate_threshold(&self, num_perm: usize) -> f64 {
        let (bands, rows) = self.layout(num_perm);
        (1.0 / bands as f64).powf(1.0 / rows as f64)
    }
}

/// Pick the band/row split whose S-curve midpoint sits closest to `threshold`
///
/// Only layouts that use the full signature budget as tightly as possible
/// (`bands * rows <= num_perm`) are considered.
pub fn layout_for_threshold(threshold: f64, num_perm: usize) -> (usize, usize) {
    let mut best = (num_perm.max(1), 1);
    let mut best_distance = f64::MAX;

    for rows in 1..=num_perm.max(1) {
        let bands = num_perm / rows;
        if bands == 0 {
            break;
        }
        let midpoint = (1.0 / bands as f64).powf(1.0 / rows as f64);
        let distance = (midpoint - threshold).abs();
        if distance < best_distance {
            best_distance = distance;
            best = (bands, rows);
        }
    }

    best
}

/// Structural (subject/predicate/object) generator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuralConfig {
    #[serde(default = "default_structural_max_pairs")]
    pub max_pairs: usize,

    /// Minimum difference in percentage points for percent-style values
    #[serde(default = "default_percent_point_threshold")]
    pub percent_point_threshold: f64,

    /// Relative difference above which plain values conflict
    #[serde(default = "default_relative_threshold")]
    pub relative_threshold: f64,

    /// Absolute difference above which plain values conflict
    #[serde(default = "default_absolute_threshold")]
    pub absolute_threshold: f64,
}

fn default_structural_max_pairs() -> usize {
    30
}

fn default_percent_point_threshold() -> f64 {
    10.0
}

fn default_relative_threshold() -> f64 {
    0.2
}

fn default_absolute_threshold() -> f64 {
    1.0
}

impl Default for StructuralConfig {
    fn default() -> Self {
        Self {
            max_pairs: default_structural_max_pairs(),
            percent_point_threshold: default_percent_point_threshold(),
            relative_threshold: default_relative_threshold(),
            absolute_threshold: default_absolute_threshold(),
        }
    }
}

/// One contradiction pattern: any fact mentioning a phrase from `side_a`
/// is paired with any fact mentioning a phrase from `side_b`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordPattern {
    pub name: String,
    pub side_a: Vec<String>,
    pub side_b: Vec<String>,
}

impl KeywordPattern {
    pub fn new(name: &str, side_a: &[&str], side_b: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            side_a: side_a.iter().map(|s| s.to_string()).collect(),
            side_b: side_b.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Keyword pattern generator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    #[serde(default = "default_keyword_max_pairs")]
    pub max_pairs: usize,

    /// Keep the built-in English and Chinese pattern sets
    #[serde(default = "default_include_builtin")]
    pub include_builtin: bool,

    /// Additional patterns
    #[serde(default)]
    pub patterns: Vec<KeywordPattern>,

    /// Topic words whose facts are compared by the percentages they quote
    #[serde(default = "default_percent_topics")]
    pub percent_topics: Vec<String>,

    /// Percentage-point spread that pairs two topic facts
    #[serde(default = "default_percent_spread")]
    pub percent_spread: f64,
}

fn default_keyword_max_pairs() -> usize {
    30
}

fn default_include_builtin() -> bool {
    true
}

fn default_percent_topics() -> Vec<String> {
    vec!["renovation".to_string(), "装修".to_string()]
}

fn default_percent_spread() -> f64 {
    15.0
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            max_pairs: default_keyword_max_pairs(),
            include_builtin: default_include_builtin(),
            patterns: vec![],
            percent_topics: default_percent_topics(),
            percent_spread: default_percent_spread(),
        }
    }
}

/// Candidate aggregator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Global cap on candidate pairs handed to adjudication
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

fn default_max_candidates() -> usize {
    300
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
        }
    }
}

/// Adjudication orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Concurrent adjudication calls per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Optional per-call timeout in milliseconds
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

fn default_batch_size() -> usize {
    10
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            call_timeout_ms: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

/// Repetition clustering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepetitionConfig {
    /// Text similarity ratio at which two facts count as near-identical
    #[serde(default = "default_near_identical_threshold")]
    pub near_identical_threshold: f64,

    /// Smallest cluster emitted as a single repetition group
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Sentences shorter than this (in chars) are ignored by the section scan
    #[serde(default = "default_min_sentence_chars")]
    pub min_sentence_chars: usize,

    /// Occurrences needed before a sentence is reported by the section scan
    #[serde(default = "default_min_section_occurrences")]
    pub min_section_occurrences: usize,
}

fn default_near_identical_threshold() -> f64 {
    0.95
}

fn default_min_cluster_size() -> usize {
    3
}

fn default_min_sentence_chars() -> usize {
    20
}

fn default_min_section_occurrences() -> usize {
    3
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self {
            near_identical_threshold: default_near_identical_threshold(),
            min_cluster_size: default_min_cluster_size(),
            min_sentence_chars: default_min_sentence_chars(),
            min_section_occurrences: default_min_section_occurrences(),
        }
    }
}

/// LLM adjudicator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Chat completions endpoint (OpenAI-compatible)
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_llm_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_llm_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_llm_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_endpoint() -> String {
    "https://api.deepseek.com/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "deepseek-chat".to_string()
}

fn default_api_key_env() -> String {
    "FCE_LLM_API_KEY".to_string()
}

fn default_llm_timeout_ms() -> u64 {
    30_000
}

fn default_llm_max_retries() -> usize {
    2
}

fn default_llm_backoff_ms() -> u64 {
    200
}

fn default_llm_temperature() -> f32 {
    0.1
}

fn default_llm_max_tokens() -> u32 {
    512
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            timeout_ms: default_llm_timeout_ms(),
            max_retries: default_llm_max_retries(),
            retry_backoff_ms: default_llm_backoff_ms(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load from an optional TOML file, layered under `FCE__SECTION__KEY`
    /// environment variables, then validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix("FCE")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply individual environment overrides on top of the current values
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("FCE_SHINGLE_SIZE") {
            if let Ok(num) = val.parse() {
                self.sketch.shingle_size = num;
            }
        }

        if let Ok(val) = std::env::var("FCE_NUM_PERM") {
            if let Ok(num) = val.parse() {
                self.sketch.num_perm = num;
            }
        }

        if let Ok(val) = std::env::var("FCE_LSH_BANDS") {
            if let Ok(num) = val.parse() {
                self.lsh.bands = num;
            }
        }

        if let Ok(val) = std::env::var("FCE_LSH_ROWS") {
            if let Ok(num) = val.parse() {
                self.lsh.rows = num;
            }
        }

        if let Ok(val) = std::env::var("FCE_MAX_CANDIDATES") {
            if let Ok(num) = val.parse() {
                self.aggregator.max_candidates = num;
            }
        }

        if let Ok(val) = std::env::var("FCE_BATCH_SIZE") {
            if let Ok(num) = val.parse() {
                self.orchestrator.batch_size = num;
            }
        }

        if let Ok(val) = std::env::var("FCE_CALL_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.orchestrator.call_timeout_ms = Some(ms);
            }
        }

        if let Ok(val) = std::env::var("FCE_LLM_ENDPOINT") {
            self.llm.endpoint = val;
        }

        if let Ok(val) = std::env::var("FCE_LLM_MODEL") {
            self.llm.model = val;
        }

        if let Ok(val) = std::env::var("FCE_LOG_JSON") {
            self.logging.json = val.to_lowercase() == "true" || val == "1";
        }

        self
    }

    /// Reject parameter combinations that cannot produce a working engine
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sketch.validate()?;
        self.validate_lsh()?;

        if self.structural.max_pairs == 0 {
            return Err(ConfigError::invalid("structural.max_pairs", "must be at least 1"));
        }
        for (field, value) in [
            ("structural.percent_point_threshold", self.structural.percent_point_threshold),
            ("structural.relative_threshold", self.structural.relative_threshold),
            ("structural.absolute_threshold", self.structural.absolute_threshold),
            ("keyword.percent_spread", self.keyword.percent_spread),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field, format!("{} is not a non-negative number", value)));
            }
        }

        if self.keyword.max_pairs == 0 {
            return Err(ConfigError::invalid("keyword.max_pairs", "must be at least 1"));
        }
        for pattern in &self.keyword.patterns {
            if pattern.side_a.is_empty() || pattern.side_b.is_empty() {
                return Err(ConfigError::invalid(
                    "keyword.patterns",
                    format!("pattern '{}' needs phrases on both sides", pattern.name),
                ));
            }
        }

        if self.aggregator.max_candidates == 0 {
            return Err(ConfigError::invalid("aggregator.max_candidates", "must be at least 1"));
        }
        if self.orchestrator.batch_size == 0 {
            return Err(ConfigError::invalid("orchestrator.batch_size", "must be at least 1"));
        }
        if self.orchestrator.call_timeout_ms == Some(0) {
            return Err(ConfigError::invalid("orchestrator.call_timeout_ms", "must be positive when set"));
        }

        self.repetition.validate()
    }

    fn validate_lsh(&self) -> Result<(), ConfigError> {
        if let Some(threshold) = self.lsh.threshold {
            if !(threshold > 0.0 && threshold < 1.0) {
                return Err(ConfigError::invalid("lsh.threshold", format!("{} is outside (0, 1)", threshold)));
            }
        }
        let (bands, rows) = self.lsh.layout(self.sketch.num_perm);
        validate_layout(bands, rows, self.sketch.num_perm)?;
        if self.lsh.max_similarity_pairs == 0 {
            return Err(ConfigError::invalid("lsh.max_similarity_pairs", "must be at least 1"));
        }
        Ok(())
    }
}

impl SketchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shingle_size == 0 {
            return Err(ConfigError::invalid("sketch.shingle_size", "must be at least 1"));
        }
        if self.num_perm == 0 {
            return Err(ConfigError::invalid("sketch.num_perm", "must be at least 1"));
        }
        if self.min_token_chars == 0 {
            return Err(ConfigError::invalid("sketch.min_token_chars", "must be at least 1"));
        }
        Ok(())
    }
}

impl RepetitionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.near_identical_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "repetition.near_identical_threshold",
                format!("{} is outside (0, 1]", threshold),
            ));
        }
        if self.min_cluster_size < 2 {
            return Err(ConfigError::invalid("repetition.min_cluster_size", "must be at least 2"));
        }
        if self.min_section_occurrences < 2 {
            return Err(ConfigError::invalid("repetition.min_section_occurrences", "must be at least 2"));
        }
        Ok(())
    }
}

/// Check a band/row split against the signature length
pub fn validate_layout(bands: usize, rows: usize, num_perm: usize) -> Result<(), ConfigError> {
    if bands == 0 || rows == 0 || bands.checked_mul(rows).map_or(true, |n| n > num_perm) {
        return Err(ConfigError::BandLayout { bands, rows, num_perm });
    }
    Ok(())
}
