use crate::config::app_config::{AppConfig, CoinDeskConfig, FetchDefaults, SecretsConfig};
use crate::domain::model::Event;
use crate::domain::ports::NewsSource;
use crate::utils::error::{FactorError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

pub const SOURCE_NAME: &str = "CoinDesk";

/// CoinDesk news list API.
pub struct CoinDeskSource {
    api_key: Option<String>,
    base_url: String,
    fetch_defaults: FetchDefaults,
    timeout: Duration,
    client: Option<Client>,
}

impl CoinDeskSource {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        fetch_defaults: FetchDefaults,
        timeout_sec: u64,
    ) -> Self {
        let source = Self {
            api_key,
            base_url: base_url.into(),
            fetch_defaults,
            timeout: Duration::from_secs(timeout_sec),
            client: None,
        };
        tracing::debug!(
            "Init CoinDeskSource: base_url={} timeout={:?} lang={} limit={} to_ts={}",
            source.base_url,
            source.timeout,
            source.fetch_defaults.lang,
            source.fetch_defaults.limit,
            source.fetch_defaults.to_ts
        );
        source
    }

    pub fn from_config(cfg: &CoinDeskConfig, secrets: &SecretsConfig) -> Result<Self> {
        let base_url = cfg
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| FactorError::MissingConfigError {
                field: "data_sources.coindesk.base_url".to_string(),
            })?;
        let api_key = AppConfig::api_key(&secrets.coindesk_api_key_env);
        if api_key.is_none() {
            tracing::warn!(
                "{} is not set; calling CoinDesk without authorization",
                secrets.coindesk_api_key_env
            );
        }
        Ok(Self::new(
            base_url,
            api_key,
            cfg.fetch.clone(),
            cfg.timeout_sec,
        ))
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn build_params(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<(String, String)> {
        let defaults = &self.fetch_defaults;
        let mut params = vec![
            ("lang".to_string(), defaults.lang.clone()),
            ("limit".to_string(), defaults.limit.to_string()),
        ];

        for (name, values) in [
            ("categories", &defaults.categories),
            ("exclude_categories", &defaults.exclude_categories),
            ("source_ids", &defaults.source_ids),
        ] {
            if !values.is_empty() {
                params.push((name.to_string(), values.join(",")));
            }
        }

        if let Some(start) = start {
            params.push(("from_ts".to_string(), start.timestamp().to_string()));
        }
        let to_ts = end.map(|e| e.timestamp()).unwrap_or(defaults.to_ts);
        params.push(("to_ts".to_string(), to_ts.to_string()));

        params
    }
}

/// First non-empty string among `keys`.
fn first_str<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| item.get(*k).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

/// First non-null value among `keys`.
fn first_value(item: &Value, keys: &[&str]) -> Value {
    keys.iter()
        .filter_map(|k| item.get(*k))
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null)
}

#[async_trait]
impl NewsSource for CoinDeskSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn connect(&mut self) -> Result<()> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e| {
                FactorError::ConfigError {
                    message: format!("Invalid CoinDesk API key: {}", e),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .build()?;
        self.client = Some(client);
        tracing::info!("Connected to CoinDesk API (timeout={:?})", self.timeout);
        Ok(())
    }

    async fn fetch(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<Value> {
        let client = self.client.as_ref().ok_or_else(|| FactorError::SourceError {
            source_name: SOURCE_NAME.to_string(),
            message: "Call connect() before fetch()".to_string(),
        })?;

        let params = self.build_params(start, end);
        tracing::debug!("Fetching: url={} params={:?}", self.base_url, params);

        let response = client.get(&self.base_url).query(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body: String = response.text().await.unwrap_or_default().chars().take(400).collect();
            tracing::error!("HTTP error: status={} body={}", status, body);
            return Err(FactorError::HttpStatusError {
                url: self.base_url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("Fetched OK: status={}", status);
        Ok(response.json().await?)
    }

    fn normalize(&self, raw: Value) -> Result<Vec<Event>> {
        let now = Utc::now();
        let items = ["Data", "data"]
            .iter()
            .filter_map(|k| raw.get(*k).and_then(Value::as_array))
            .find(|items| !items.is_empty())
            .cloned()
            .unwrap_or_default();

        let events: Vec<Event> = items
            .iter()
            .map(|item| {
                let title = first_str(item, &["TITLE", "title"]).unwrap_or("No title");
                let body =
                    first_str(item, &["BODY", "summary", "content"]).unwrap_or("No content");

                let mut event = Event::new(SOURCE_NAME, title, body);
                event.timestamp = Some(now);
                event.meta.insert("id".to_string(), first_value(item, &["ID", "id"]));
                event.meta.insert("url".to_string(), first_value(item, &["URL", "url"]));
                event.meta.insert(
                    "categories".to_string(),
                    first_value(item, &["CATEGORIES", "categories"]),
                );
                event
            })
            .collect();

        tracing::debug!("Normalized {} events from CoinDesk", events.len());
        Ok(events)
    }

    async fn close(&mut self) -> Result<()> {
        if self.client.take().is_some() {
            tracing::info!("CoinDesk session closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use httpmock::prelude::*;
    use serde_json::json;

    fn source(base_url: String, api_key: Option<&str>) -> CoinDeskSource {
        CoinDeskSource::new(
            base_url,
            api_key.map(str::to_string),
            FetchDefaults::default(),
            5,
        )
    }

    #[test]
    fn test_from_config_requires_base_url() {
        let result = CoinDeskSource::from_config(&CoinDeskConfig::default(), &SecretsConfig::default());
        assert!(matches!(result, Err(FactorError::MissingConfigError { .. })));
    }

    #[test]
    fn test_build_params() {
        let mut defaults = FetchDefaults::default();
        defaults.categories = vec!["BTC".to_string(), "ETH".to_string()];
        let src = CoinDeskSource::new("https://x.test/list", None, defaults, 5);

        let params = src.build_params(None, None);
        assert!(params.contains(&("lang".to_string(), "EN".to_string())));
        assert!(params.contains(&("limit".to_string(), "10".to_string())));
        assert!(params.contains(&("categories".to_string(), "BTC,ETH".to_string())));
        assert!(params.contains(&("to_ts".to_string(), "-1".to_string())));
        assert!(!params.iter().any(|(k, _)| k == "from_ts" || k == "source_ids"));

        let start = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 9, 2, 0, 0, 0).unwrap();
        let params = src.build_params(Some(start), Some(end));
        assert!(params.contains(&("from_ts".to_string(), start.timestamp().to_string())));
        assert!(params.contains(&("to_ts".to_string(), end.timestamp().to_string())));
    }

    #[tokio::test]
    async fn test_fetch_before_connect_fails() {
        let src = source("https://x.test/list".to_string(), None);
        let result = src.fetch(None, None).await;
        assert!(matches!(result, Err(FactorError::SourceError { .. })));
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer_and_params() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/news/v1/article/list")
                .header("Authorization", "Bearer secret")
                .query_param("lang", "EN")
                .query_param("limit", "10");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({"Data": [{"TITLE": "BTC ETF inflows", "BODY": "Record day"}]}));
        });

        let mut src = source(server.url("/news/v1/article/list"), Some("secret"));
        src.connect().await.unwrap();
        let raw = src.fetch(None, None).await.unwrap();
        let events = src.normalize(raw).unwrap();
        src.close().await.unwrap();

        api_mock.assert();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "BTC ETF inflows");
        assert!(!src.is_connected());
    }

    #[tokio::test]
    async fn test_fetch_http_error_carries_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/list");
            then.status(401).body("unauthorized");
        });

        let mut src = source(server.url("/list"), None);
        src.connect().await.unwrap();
        match src.fetch(None, None).await {
            Err(FactorError::HttpStatusError { status, body, .. }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "unauthorized");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_normalize_field_fallbacks() {
        let src = source("https://x.test/list".to_string(), None);
        let raw = json!({
            "data": [
                {"title": "ETH upgrade", "summary": "Devs set date", "id": 7, "url": "https://n/7"},
                {"CATEGORIES": [{"NAME": "SOL"}]},
                {"TITLE": "", "BODY": "   ", "content": "Body from content"}
            ]
        });

        let events = src.normalize(raw).unwrap();
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].title, "ETH upgrade");
        assert_eq!(events[0].content, "Devs set date");
        assert_eq!(events[0].source, "CoinDesk");
        assert_eq!(events[0].meta["id"], json!(7));
        assert_eq!(events[0].meta["url"], json!("https://n/7"));
        assert!(events[0].timestamp.is_some());

        assert_eq!(events[1].title, "No title");
        assert_eq!(events[1].content, "No content");
        assert_eq!(events[1].meta["categories"], json!([{"NAME": "SOL"}]));
        assert_eq!(events[1].meta["id"], Value::Null);

        assert_eq!(events[2].title, "No title");
        assert_eq!(events[2].content, "Body from content");
    }

    #[test]
    fn test_normalize_missing_data() {
        let src = source("https://x.test/list".to_string(), None);
        assert!(src.normalize(json!({"Err": {}})).unwrap().is_empty());
        assert!(src.normalize(json!({"Data": []})).unwrap().is_empty());
    }
}
