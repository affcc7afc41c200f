//! Data models for extracted facts

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Whether a fact asserts or denies its predicate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    #[default]
    Affirmative,
    Negative,
}

/// Whether a fact can be checked against public sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifiableType {
    #[default]
    Public,
    Internal,
}

/// Where in the document a fact was extracted from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactLocation {
    #[serde(default)]
    pub section_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
}

impl FactLocation {
    pub fn new(section_index: usize, section_title: Option<String>) -> Self {
        Self {
            section_index,
            section_title,
        }
    }

    /// Human-readable location, one-based
    pub fn describe(&self) -> String {
        match self.section_title.as_deref().filter(|t| !t.is_empty()) {
            Some(title) => format!("Section {}: {}", self.section_index + 1, title),
            None => format!("Section {}", self.section_index + 1),
        }
    }
}

/// Qualifiers attached to a fact's value
///
/// Known qualifiers are typed; anything else the extractor attaches is
/// preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

/// Extracted factual statement (read-only to the engine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub predicate: String,
    #[serde(default)]
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default)]
    pub polarity: Polarity,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub location: FactLocation,
    #[serde(default)]
    pub verifiable_type: VerifiableType,
    /// Extractor category label (e.g. "data", "date", "conclusion")
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub fact_type: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    0.5
}

impl Fact {
    /// Create a fact with only an id and canonical content
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: String::new(),
            predicate: String::new(),
            object: String::new(),
            value: None,
            modifiers: Modifiers::default(),
            time: None,
            polarity: Polarity::Affirmative,
            content: content.into(),
            original_text: String::new(),
            location: FactLocation::default(),
            verifiable_type: VerifiableType::Public,
            fact_type: None,
            confidence: default_confidence(),
        }
    }

    pub fn with_triple(mut self, subject: &str, predicate: &str, object: &str) -> Self {
        self.subject = subject.to_string();
        self.predicate = predicate.to_string();
        self.object = object.to_string();
        self
    }

    pub fn with_value(mut self, value: f64, unit: Option<&str>) -> Self {
        self.value = Some(value);
        self.modifiers.unit = unit.map(String::from);
        self
    }

    pub fn with_time(mut self, time: &str) -> Self {
        self.time = Some(time.to_string());
        self
    }

    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn with_original_text(mut self, text: &str) -> Self {
        self.original_text = text.to_string();
        self
    }

    pub fn with_location(mut self, section_index: usize, title: Option<&str>) -> Self {
        self.location = FactLocation::new(section_index, title.map(String::from));
        self
    }

    pub fn with_type(mut self, fact_type: &str) -> Self {
        self.fact_type = Some(fact_type.to_string());
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Normalized (subject, predicate, object) grouping key
    pub fn triple_key(&self) -> (String, String, String) {
        (
            normalize_role(&self.subject),
            normalize_role(&self.predicate),
            normalize_role(&self.object),
        )
    }

    /// Text fed to the tokenizer and the keyword matcher
    pub fn similarity_text(&self) -> String {
        match (self.content.trim(), self.original_text.trim()) {
            (content, "") => content.to_string(),
            ("", original) => original.to_string(),
            (content, original) => format!("{} {}", content, original),
        }
    }

    /// True when the value is expressed in percent
    pub fn is_percent(&self) -> bool {
        let unit_is_percent = self
            .modifiers
            .unit
            .as_deref()
            .map(|u| matches!(u.trim().to_lowercase().as_str(), "%" | "percent" | "pct" | "percentage"))
            .unwrap_or(false);
        unit_is_percent || self.original_text.contains('%')
    }

    /// Trimmed, non-empty time value
    pub fn normalized_time(&self) -> Option<&str> {
        self.time.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// SHA-256 of the whitespace- and case-normalized content
    pub fn content_hash(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(normalize_role(&self.content).as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Trim, lowercase and collapse internal whitespace
pub fn normalize_role(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Document section, used by the section repetition scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub index: usize,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl Section {
    pub fn new(index: usize, title: &str, content: &str) -> Self {
        Self {
            index,
            title: title.to_string(),
            content: content.to_string(),
        }
    }
}
