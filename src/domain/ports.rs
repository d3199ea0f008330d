use crate::domain::model::{ChatMessage, Event, FactorBatch, TextualFactor};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Upstream data source. Callers drive it as connect → fetch → normalize → close.
#[async_trait]
pub trait NewsSource: Send + Sync {
    fn name(&self) -> &str;
    async fn connect(&mut self) -> Result<()>;
    async fn fetch(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<serde_json::Value>;
    fn normalize(&self, raw: serde_json::Value) -> Result<Vec<Event>>;
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Chat completion whose reply is parsed as a JSON document.
    async fn json_chat(&self, messages: &[ChatMessage], max_tokens: u32)
        -> Result<serde_json::Value>;
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, date: DateTime<Utc>, events: Vec<Event>) -> Result<TextualFactor>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Event>>;
    async fn transform(&self, events: Vec<Event>) -> Result<FactorBatch>;
    async fn load(&self, batch: FactorBatch) -> Result<String>;
}
