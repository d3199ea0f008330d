use crate::config::app_config::{AppConfig, DuneConfig, SecretsConfig};
use crate::domain::model::Event;
use crate::domain::ports::NewsSource;
use crate::utils::cache::TtlCache;
use crate::utils::error::{FactorError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const SOURCE_NAME: &str = "Dune";
const MAX_LISTED: usize = 5;

/// One row of the weekly mentions queries.
#[derive(Debug, Clone, Deserialize)]
pub struct MentionRow {
    pub symbol: String,
    pub mention_growth: f64,
}

/// Weekly social-mention growth per sector, read from saved Dune queries.
pub struct DuneSocialSource {
    api_key: String,
    base_url: String,
    timeout: Duration,
    query_ids: BTreeMap<String, u64>,
    cache: TtlCache,
    client: Option<Client>,
}

impl DuneSocialSource {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        query_ids: BTreeMap<String, u64>,
        cache: TtlCache,
        timeout_sec: u64,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_sec),
            query_ids,
            cache,
            client: None,
        }
    }

    pub fn from_config(cfg: &DuneConfig, secrets: &SecretsConfig, cache_dir: &str) -> Result<Self> {
        let api_key = AppConfig::api_key(&secrets.dune_api_key_env).ok_or_else(|| {
            FactorError::MissingConfigError {
                field: secrets.dune_api_key_env.clone(),
            }
        })?;
        let cache = TtlCache::new(
            Path::new(cache_dir).join("dune"),
            Duration::from_secs(cfg.cache_ttl_hours * 3600),
        );
        Ok(Self::new(
            api_key,
            cfg.base_url.clone(),
            cfg.query_ids.clone(),
            cache,
            cfg.timeout_sec,
        ))
    }

    fn cache_key(&self) -> Value {
        json!({
            "func": "DuneSocialSource.fetch",
            "ns": self.query_ids,
        })
    }

    async fn fetch_uncached(&self, client: &Client) -> Result<Value> {
        let mut results = serde_json::Map::new();
        for (label, query_id) in &self.query_ids {
            let url = format!("{}/query/{}/results", self.base_url, query_id);
            tracing::debug!("Fetching Dune query {} ({})", query_id, label);

            let response = client
                .get(&url)
                .header("X-Dune-API-Key", &self.api_key)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let body: String =
                    response.text().await.unwrap_or_default().chars().take(400).collect();
                return Err(FactorError::HttpStatusError {
                    url,
                    status: status.as_u16(),
                    body,
                });
            }

            let payload: Value = response.json().await?;
            let rows = payload
                .pointer("/result/rows")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()));
            results.insert(label.clone(), rows);
        }
        Ok(Value::Object(results))
    }
}

/// Whole percent, halves rounded to even.
fn percent(growth: f64) -> i64 {
    (growth * 100.0).round_ties_even() as i64
}

/// Renders a short weekly summary: up to five growers, then up to five
/// decliners (zero growth counts as a decline).
pub fn build_mentions_text(rows: &[MentionRow], category: &str) -> String {
    let (positive, negative): (Vec<&MentionRow>, Vec<&MentionRow>) =
        rows.iter().partition(|r| r.mention_growth > 0.0);

    let mut text = String::new();

    if !positive.is_empty() {
        text.push_str(&format!(
            "Over the past week, {} mentions showed strong growth:\n",
            category
        ));
        let info: Vec<String> = positive
            .iter()
            .take(MAX_LISTED)
            .map(|r| format!("{} (+{}%)", r.symbol, percent(r.mention_growth)))
            .collect();
        text.push_str(&info.join(", "));
        text.push_str(".\n");
    }

    if !negative.is_empty() {
        let info: Vec<String> = negative
            .iter()
            .take(MAX_LISTED)
            .map(|r| format!("{} ({}%)", r.symbol, percent(r.mention_growth)))
            .collect();
        text.push_str(&info.join(", "));
        text.push_str(" recorded declines, signaling reduced community interest.\n");
    }

    text
}

#[async_trait]
impl NewsSource for DuneSocialSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn connect(&mut self) -> Result<()> {
        self.client = Some(Client::builder().timeout(self.timeout).build()?);
        tracing::info!("Connected to Dune API");
        Ok(())
    }

    async fn fetch(&self, _start: Option<DateTime<Utc>>, _end: Option<DateTime<Utc>>) -> Result<Value> {
        let client = self.client.as_ref().ok_or_else(|| FactorError::SourceError {
            source_name: SOURCE_NAME.to_string(),
            message: "Call connect() before fetch()".to_string(),
        })?;
        let key = self.cache_key();
        self.cache
            .get_or_insert_with(&key, || self.fetch_uncached(client))
            .await
    }

    fn normalize(&self, raw: Value) -> Result<Vec<Event>> {
        let Value::Object(by_label) = raw else {
            return Err(FactorError::SourceError {
                source_name: SOURCE_NAME.to_string(),
                message: "Expected an object keyed by query label".to_string(),
            });
        };

        let mut events = Vec::with_capacity(by_label.len());
        for (label, rows) in by_label {
            let rows: Vec<MentionRow> = serde_json::from_value(rows)?;
            let mut event = Event::new(
                SOURCE_NAME,
                format!("Weekly {} Mentions Report", label),
                build_mentions_text(&rows, &label),
            );
            event.asset = Some(label.clone());
            if let Some(query_id) = self.query_ids.get(&label) {
                event.meta.insert("query_id".to_string(), json!(query_id));
            }
            events.push(event);
        }

        tracing::debug!("Normalized {} events from Dune", events.len());
        Ok(events)
    }

    async fn close(&mut self) -> Result<()> {
        self.client = None;
        tracing::info!("Closed Dune connection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn row(symbol: &str, growth: f64) -> MentionRow {
        MentionRow {
            symbol: symbol.to_string(),
            mention_growth: growth,
        }
    }

    #[test]
    fn test_build_mentions_text() {
        let rows = vec![
            row("SUI", 0.42),
            row("APT", -0.1),
            row("SEI", 0.75),
            row("NEAR", 0.0),
        ];
        let text = build_mentions_text(&rows, "Layer 1");
        assert_eq!(
            text,
            "Over the past week, Layer 1 mentions showed strong growth:\n\
             SUI (+42%), SEI (+75%).\n\
             APT (-10%), NEAR (0%) recorded declines, signaling reduced community interest.\n"
        );
    }

    #[test]
    fn test_build_mentions_text_rounds_halves_to_even() {
        let rows = vec![row("SUI", 0.125), row("APT", -0.125), row("SEI", 0.135)];
        let text = build_mentions_text(&rows, "Layer 1");
        assert_eq!(
            text,
            "Over the past week, Layer 1 mentions showed strong growth:\n\
             SUI (+12%), SEI (+14%).\n\
             APT (-12%) recorded declines, signaling reduced community interest.\n"
        );
    }

    #[test]
    fn test_build_mentions_text_caps_lists() {
        let rows: Vec<MentionRow> = (0..8).map(|i| row(&format!("T{}", i), 0.1)).collect();
        let text = build_mentions_text(&rows, "Layer 2");
        assert!(text.contains("T4 (+10%)"));
        assert!(!text.contains("T5"));
        assert!(!text.contains("declines"));
        assert_eq!(build_mentions_text(&[], "Layer 2"), "");
    }

    #[tokio::test]
    async fn test_fetch_normalize_and_cache() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/query/3682694/results")
                .header("X-Dune-API-Key", "dune-key");
            then.status(200).json_body(json!({
                "result": {"rows": [
                    {"symbol": "SUI", "mention_growth": 0.5},
                    {"symbol": "APT", "mention_growth": -0.2}
                ]}
            }));
        });

        let dir = TempDir::new().unwrap();
        let cache = TtlCache::new(dir.path(), Duration::from_secs(3600));
        let mut src = DuneSocialSource::new(
            "dune-key",
            server.base_url(),
            BTreeMap::from([("Layer 1".to_string(), 3682694)]),
            cache,
            5,
        );

        src.connect().await.unwrap();
        let first = src.fetch(None, None).await.unwrap();
        let second = src.fetch(None, None).await.unwrap();
        src.close().await.unwrap();

        api_mock.assert_hits(1);
        assert_eq!(first, second);

        let events = src.normalize(first).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Weekly Layer 1 Mentions Report");
        assert_eq!(events[0].asset.as_deref(), Some("Layer 1"));
        assert_eq!(events[0].source, "Dune");
        assert!(events[0].timestamp.is_none());
        assert_eq!(events[0].meta["query_id"], json!(3682694));
        assert!(events[0].content.contains("SUI (+50%)"));
        assert!(events[0].content.contains("APT (-20%)"));
    }

    #[test]
    fn test_normalize_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        let src = DuneSocialSource::new(
            "k",
            "https://api.dune.com/api/v1",
            BTreeMap::new(),
            TtlCache::new(dir.path(), Duration::from_secs(1)),
            5,
        );
        assert!(src.normalize(json!([1, 2])).is_err());
    }
}
