use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized item pulled from an upstream data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: Option<DateTime<Utc>>,
    pub asset: Option<String>,
    pub source: String,
    pub title: String,
    pub content: String,
    pub sentiment: Option<f64>,
    #[serde(default)]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl Event {
    pub fn new(source: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            asset: None,
            source: source.into(),
            title: title.into(),
            content: content.into(),
            sentiment: None,
            meta: serde_json::Map::new(),
        }
    }
}

/// A single text-derived claim about one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub text: String,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_confidence() -> f64 {
    1.0
}

impl Observation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            asset: None,
            confidence: default_confidence(),
            tags: Vec::new(),
        }
    }

    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = Some(asset.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// A timestamped bundle of observations produced by one agent under one
/// preference category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextualFactor {
    pub date: DateTime<Utc>,
    pub agent_name: String,
    pub observations: Vec<Observation>,
    pub length_tokens: usize,
    #[serde(default)]
    pub preference: Option<String>,
    #[serde(default)]
    pub raw_sources: Vec<Event>,
}

impl fmt::Display for TextualFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "TextualFactor(date={}, agent={}, preference={}, obs={}, tokens={})",
            self.date.format("%Y-%m-%d %H:%M:%S"),
            self.agent_name,
            self.preference.as_deref().unwrap_or("-"),
            self.observations.len(),
            self.length_tokens
        )?;
        for obs in &self.observations {
            writeln!(
                f,
                "  [{}] conf={:.2} tags={} :: {}",
                obs.asset.as_deref().unwrap_or("NA"),
                obs.confidence,
                obs.tags.join(","),
                obs.text
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Output of the transform phase: the agent's factor plus its per-tag split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorBatch {
    pub base: TextualFactor,
    pub tag_factors: Vec<TextualFactor>,
}
