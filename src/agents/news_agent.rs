use crate::config::app_config::NewsAgentConfig;
use crate::domain::model::{ChatMessage, Event, Observation, TextualFactor};
use crate::domain::ports::{Agent, LlmClient};
use crate::factors::tags::{normalize_tags, DEFAULT_MAX_TAGS};
use crate::factors::text::{guess_asset, is_known_asset, observation_tokens, rough_token_len};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;

pub const DEFAULT_AGENT_NAME: &str = "NewsDataAgent";
pub const NEUTRAL_TEXT: &str = "No new significant events identified; neutral day.";
const FALLBACK_CONFIDENCE: f64 = 0.7;
const CONTENT_PREVIEW_CHARS: usize = 280;

const SYSTEM_PROMPT: &str = "You are a DataAgent in a multi-agent trading system. \
Produce a SHORT textual factor with 3–7 atomic observations for the day. \
Each observation MUST focus on ONE asset and include a brief causal reason \
for 1–3 day price impact. \
Additionally, assign smart topical tags per observation.";

const RESPONSE_SCHEMA: &str = r#"Return STRICT JSON:
{
  "observations": [
    {
      "text": "Short atomic observation (what happened → why it matters → asset)",
      "asset": "MAIN SYMBOL in UPPERCASE or null if unsure",
      "symbols": ["LIST of possible symbols/aliases/tickers, can be empty"],
      "tags": ["LOWER_SNAKE_CASE topical tags, e.g. macro, onchain, etf, derivatives, orderbook, sentiment, tokenomics, stablecoins, ecosystem, protocol, narratives, cex, dex, liquidity"],
      "confidence": 0.0-1.0
    }
  ]
}
Rules:
- 3–7 observations; if a sentence mentions multiple assets, split into separate observations.
- DO NOT restrict symbols to a predefined list: if the asset is new/rare, still return it as-is (UPPERCASE). Contract/address can be noted as "CA:<address>" in symbols.
- Tags MUST be topical (not assets), in lower_snake_case. Create a new tag if necessary (keep it short and general).
- Keep it short (overall ≤ ~4k tokens).
"#;

/// Turns a day's batch of events into one textual factor: preference
/// filtering, LLM extraction of atomic observations, then dedup and limits.
pub struct NewsDataAgent<L: LlmClient> {
    name: String,
    preference: Option<String>,
    max_obs: usize,
    max_tokens_factor: usize,
    llm_max_output_tokens: u32,
    llm: L,
}

impl<L: LlmClient> NewsDataAgent<L> {
    pub fn new(llm: L) -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            preference: None,
            max_obs: 7,
            max_tokens_factor: 4000,
            llm_max_output_tokens: 1200,
            llm,
        }
    }

    pub fn from_config(cfg: &NewsAgentConfig, llm: L) -> Self {
        let agent = Self {
            name: cfg.name.clone(),
            preference: cfg.preference.clone().filter(|p| !p.trim().is_empty()),
            max_obs: cfg.max_obs,
            max_tokens_factor: cfg.max_tokens_factor,
            llm_max_output_tokens: cfg.llm_max_output_tokens,
            llm,
        };
        tracing::debug!(
            "NewsDataAgent init: pref={:?}, max_obs={}, max_tokens_factor={}, model={}",
            agent.preference,
            agent.max_obs,
            agent.max_tokens_factor,
            cfg.model
        );
        agent
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_preference(mut self, preference: Option<String>) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_limits(mut self, max_obs: usize, max_tokens_factor: usize) -> Self {
        self.max_obs = max_obs;
        self.max_tokens_factor = max_tokens_factor;
        self
    }

    /// Events mentioning the preference, most mentions first. Falls back to
    /// all events when nothing mentions it.
    pub fn filter_events(&self, events: Vec<Event>) -> Vec<Event> {
        tracing::debug!(
            "Filter: input_events={}, preference={:?}",
            events.len(),
            self.preference
        );
        let Some(pref) = self.preference.as_deref().map(str::to_lowercase) else {
            return events;
        };

        let mut scored: Vec<(usize, Event)> = events
            .iter()
            .map(|ev| {
                let haystack = format!("{} {}", ev.title, ev.content).to_lowercase();
                (haystack.matches(pref.as_str()).count(), ev.clone())
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let filtered: Vec<Event> = scored
            .into_iter()
            .filter(|(score, _)| *score > 0)
            .map(|(_, ev)| ev)
            .collect();

        if filtered.is_empty() {
            tracing::debug!("Filter: no event mentions preference; keeping all");
            return events;
        }
        tracing::debug!("Filter: output_events={}", filtered.len());
        filtered
    }

    pub fn build_messages(&self, date: DateTime<Utc>, events: &[Event]) -> Vec<ChatMessage> {
        let bullets: Vec<String> = events
            .iter()
            .enumerate()
            .map(|(i, ev)| {
                let preview: String = ev.content.trim().chars().take(CONTENT_PREVIEW_CHARS).collect();
                format!("{}. {} :: {}", i + 1, ev.title.trim(), preview)
            })
            .collect();

        let user = format!(
            "Date: {}\nPreference of the day: {}\n\nNews (headline :: brief):\n{}\n\n{}",
            date.format("%Y-%m-%d"),
            self.preference.as_deref().unwrap_or("none"),
            bullets.join("\n"),
            RESPONSE_SCHEMA
        );

        vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
    }

    pub async fn extract_observations(&self, date: DateTime<Utc>, events: &[Event]) -> Vec<Observation> {
        let messages = self.build_messages(date, events);
        tracing::debug!(
            "LLM call: events={}, tokens_hint<={}",
            events.len(),
            self.llm_max_output_tokens
        );

        let data = match self.llm.json_chat(&messages, self.llm_max_output_tokens).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("LLM call failed, falling back to headlines: {}", e);
                return events.iter().map(fallback_observation).collect();
            }
        };

        let raw = data
            .get("observations")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        tracing::debug!("LLM parsed observations: {}", raw.len());

        raw.iter()
            .enumerate()
            .map(|(i, item)| {
                let obs = parse_observation(item);
                tracing::debug!(
                    "Obs {}: asset={:?} tags={:?} conf={:.2}",
                    i + 1,
                    obs.asset,
                    obs.tags,
                    obs.confidence
                );
                obs
            })
            .collect()
    }

    /// Drops `asset|text` duplicates and stops at the token budget or
    /// `max_obs`, whichever comes first.
    pub fn dedup_and_limit(&self, observations: Vec<Observation>) -> Vec<Observation> {
        tracing::debug!("Dedup/limit: input_obs={}", observations.len());
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        let mut total = 0;

        for obs in observations {
            let key = format!("{}|{}", obs.asset.as_deref().unwrap_or("NA"), obs.text);
            if !seen.insert(key) {
                continue;
            }
            let candidate = rough_token_len(&[obs.text.as_str()]);
            if total + candidate > self.max_tokens_factor {
                tracing::debug!(
                    "Token limit reached: total={}, next={}, limit={}",
                    total,
                    candidate,
                    self.max_tokens_factor
                );
                break;
            }
            kept.push(obs);
            total += candidate;
            if kept.len() >= self.max_obs {
                tracing::debug!("max_obs reached: {}", self.max_obs);
                break;
            }
        }

        tracing::debug!("Dedup/limit: output_obs={}, tokens≈{}", kept.len(), total);
        kept
    }

    fn neutral_factor(&self, date: DateTime<Utc>) -> TextualFactor {
        let observation = Observation::new(NEUTRAL_TEXT).with_tags(["news"]);
        TextualFactor {
            date,
            agent_name: self.name.clone(),
            length_tokens: rough_token_len(&[NEUTRAL_TEXT]),
            observations: vec![observation],
            preference: self.preference.clone(),
            raw_sources: Vec::new(),
        }
    }
}

fn fallback_observation(ev: &Event) -> Observation {
    let mut obs = Observation::new(format!(
        "{}. May affect short-term supply/demand.",
        ev.title.trim()
    ))
    .with_confidence(FALLBACK_CONFIDENCE)
    .with_tags(["news", "fallback"]);
    obs.asset = guess_asset(&format!("{} {}", ev.title, ev.content));
    obs
}

/// Missing, null, zero or unparsable confidence counts as 1.0.
fn parse_confidence(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(c) if c.is_finite() && c != 0.0 => c.clamp(0.0, 1.0),
        _ => 1.0,
    }
}

fn parse_observation(item: &Value) -> Observation {
    let text = item
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();

    let asset = item
        .get("asset")
        .and_then(Value::as_str)
        .map(|a| a.trim().to_uppercase())
        .filter(|a| !a.is_empty())
        .or_else(|| guess_asset(&text));

    if let Some(asset) = asset.as_deref().filter(|a| !is_known_asset(a)) {
        let symbols = item.get("symbols").cloned().unwrap_or(Value::Null);
        tracing::info!(
            "LLM detected possibly new/unknown symbol: {} (symbols={})",
            asset,
            symbols
        );
    }

    let raw_tags: Vec<String> = item
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .map(|t| match t {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut tags = normalize_tags(&raw_tags, &text, DEFAULT_MAX_TAGS);
    if tags.is_empty() {
        tags.push("news".to_string());
    }

    Observation {
        text,
        asset,
        confidence: parse_confidence(item.get("confidence")),
        tags,
    }
}

#[async_trait]
impl<L: LlmClient> Agent for NewsDataAgent<L> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, date: DateTime<Utc>, events: Vec<Event>) -> Result<TextualFactor> {
        tracing::info!(
            "Run: date={}, raw_events={}",
            date.format("%Y-%m-%d"),
            events.len()
        );
        let filtered = self.filter_events(events);

        if filtered.is_empty() {
            tracing::info!("No relevant events; emitting neutral factor");
            return Ok(self.neutral_factor(date));
        }

        let observations = self.extract_observations(date, &filtered).await;
        let observations = self.dedup_and_limit(observations);
        let length_tokens = observation_tokens(&observations);

        tracing::info!(
            "Factor built: obs={}, tokens≈{}",
            observations.len(),
            length_tokens
        );
        Ok(TextualFactor {
            date,
            agent_name: self.name.clone(),
            observations,
            length_tokens,
            preference: self.preference.clone(),
            raw_sources: filtered,
        })
    }
}
