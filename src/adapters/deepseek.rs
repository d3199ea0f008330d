use crate::config::app_config::{AppConfig, NewsAgentConfig, SecretsConfig};
use crate::domain::model::ChatMessage;
use crate::domain::ports::LlmClient;
use crate::utils::error::{FactorError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat client for DeepSeek in JSON mode.
#[derive(Debug, Clone)]
pub struct DeepSeekClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
}

impl DeepSeekClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.2,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn from_config(cfg: &NewsAgentConfig, secrets: &SecretsConfig) -> Result<Self> {
        let api_key = AppConfig::api_key(&secrets.deepseek_api_key_env).ok_or_else(|| {
            FactorError::ConfigError {
                message: format!(
                    "Set {} to use the DeepSeek client",
                    secrets.deepseek_api_key_env
                ),
            }
        })?;
        Self::new(api_key, cfg.base_url.clone(), cfg.model.clone())
            .with_temperature(cfg.temperature)
            .with_timeout(Duration::from_secs(cfg.timeout_sec))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for DeepSeekClient {
    async fn json_chat(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<serde_json::Value> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens,
            response_format: ResponseFormat {
                r#type: "json_object",
            },
            stream: false,
        };

        tracing::debug!(
            "LLM request: model={} messages={} max_tokens={}",
            self.model,
            messages.len(),
            max_tokens
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response.text().await.unwrap_or_default().chars().take(400).collect();
            return Err(FactorError::HttpStatusError {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| FactorError::LlmError {
                message: "Response contained no message content".to_string(),
            })?;

        serde_json::from_str(&content).map_err(|e| FactorError::LlmError {
            message: format!("Model returned invalid JSON: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn test_json_chat_parses_content() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("Authorization", "Bearer ds-key")
                .json_body_partial(
                    r#"{"model": "deepseek-chat", "max_tokens": 300, "stream": false, "response_format": {"type": "json_object"}}"#,
                );
            then.status(200)
                .json_body(completion(r#"{"observations": [{"text": "BTC up"}]}"#));
        });

        let client = DeepSeekClient::new("ds-key", server.base_url(), DEFAULT_MODEL);
        let value = client
            .json_chat(&[ChatMessage::system("sys"), ChatMessage::user("hi")], 300)
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(value["observations"][0]["text"], "BTC up");
    }

    #[tokio::test]
    async fn test_json_chat_invalid_json_is_llm_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(completion("not json at all"));
        });

        let client = DeepSeekClient::new("k", server.base_url(), DEFAULT_MODEL);
        let result = client.json_chat(&[ChatMessage::user("hi")], 10).await;
        assert!(matches!(result, Err(FactorError::LlmError { .. })));
    }

    #[tokio::test]
    async fn test_json_chat_empty_choices() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({"choices": []}));
        });

        let client = DeepSeekClient::new("k", server.base_url(), DEFAULT_MODEL);
        let result = client.json_chat(&[ChatMessage::user("hi")], 10).await;
        assert!(matches!(result, Err(FactorError::LlmError { .. })));
    }

    #[tokio::test]
    async fn test_json_chat_http_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(429).body("rate limited");
        });

        let client = DeepSeekClient::new("k", server.base_url(), DEFAULT_MODEL);
        match client.json_chat(&[ChatMessage::user("hi")], 10).await {
            Err(err @ FactorError::HttpStatusError { .. }) => assert!(err.is_retryable()),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
