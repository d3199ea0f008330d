use crate::config::app_config::OutputConfig;
use crate::core::{Agent, NewsSource, Pipeline, Storage};
use crate::domain::model::{Event, FactorBatch, TextualFactor};
use crate::factors::tag_split::TagSplitter;
use crate::utils::error::{FactorError, Result};
use crate::utils::validation::Validate;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use tokio::sync::Mutex;
use zip::write::{FileOptions, ZipWriter};

pub const FACTORS_FILE: &str = "factors.json";
pub const OBSERVATIONS_FILE: &str = "observations.csv";
pub const BASE_FACTOR_FILE: &str = "base_factor.json";

#[derive(Debug, Serialize)]
struct ObservationRow<'a> {
    agent_name: &'a str,
    preference: &'a str,
    asset: &'a str,
    confidence: f64,
    tags: String,
    text: &'a str,
}

/// Daily factor run: news sources → agent → tag split → zip bundle.
pub struct FactorPipeline<S: Storage, A: Agent> {
    storage: S,
    agent: A,
    sources: Mutex<Vec<Box<dyn NewsSource>>>,
    splitter: TagSplitter,
    date: DateTime<Utc>,
    window: (Option<DateTime<Utc>>, Option<DateTime<Utc>>),
    output: OutputConfig,
}

impl<S: Storage, A: Agent> FactorPipeline<S, A> {
    pub fn new(
        storage: S,
        agent: A,
        sources: Vec<Box<dyn NewsSource>>,
        splitter: TagSplitter,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            storage,
            agent,
            sources: Mutex::new(sources),
            splitter,
            date,
            window: (None, None),
            output: OutputConfig::default(),
        }
    }

    /// Restricts fetches to `[start, end]`. Sources use their own defaults
    /// for an open bound.
    pub fn with_window(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.window = (start, end);
        self
    }

    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    pub fn archive_name(&self) -> String {
        format!("factors_{}.zip", self.date.format("%Y%m%d"))
    }

    async fn collect_from(&self, source: &mut dyn NewsSource) -> Result<Vec<Event>> {
        let (start, end) = self.window;
        let result = match source.connect().await {
            Ok(()) => match source.fetch(start, end).await {
                Ok(raw) => source.normalize(raw),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        if let Err(e) = source.close().await {
            tracing::warn!("Closing {} failed: {}", source.name(), e);
        }
        result
    }
}

/// One CSV row per observation across all factors.
pub fn render_observations_csv(factors: &[TextualFactor]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for factor in factors {
        for obs in &factor.observations {
            writer.serialize(ObservationRow {
                agent_name: &factor.agent_name,
                preference: factor.preference.as_deref().unwrap_or(""),
                asset: obs.asset.as_deref().unwrap_or(""),
                confidence: obs.confidence,
                tags: obs.tags.join(";"),
                text: &obs.text,
            })?;
        }
    }
    writer
        .into_inner()
        .map_err(|e| FactorError::IoError(std::io::Error::new(e.error().kind(), e.to_string())))
}

#[async_trait::async_trait]
impl<S: Storage, A: Agent> Pipeline for FactorPipeline<S, A> {
    async fn extract(&self) -> Result<Vec<Event>> {
        let mut sources = self.sources.lock().await;
        if sources.is_empty() {
            return Err(FactorError::ConfigError {
                message: "No data sources configured".to_string(),
            });
        }

        let only_source = sources.len() == 1;
        let mut events = Vec::new();
        for source in sources.iter_mut() {
            let name = source.name().to_string();
            match self.collect_from(source.as_mut()).await {
                Ok(batch) => {
                    tracing::info!("{} returned {} events", name, batch.len());
                    events.extend(batch);
                }
                Err(e) if only_source => return Err(e),
                Err(e) => {
                    tracing::warn!("Skipping source {}: {}", name, e);
                }
            }
        }

        Ok(events)
    }

    async fn transform(&self, events: Vec<Event>) -> Result<FactorBatch> {
        tracing::debug!("Running agent {} on {} events", self.agent.name(), events.len());
        let base = self.agent.run(self.date, events).await?;
        let tag_factors = self.splitter.split(base.clone());
        Ok(FactorBatch { base, tag_factors })
    }

    async fn load(&self, batch: FactorBatch) -> Result<String> {
        batch.base.validate()?;
        for factor in &batch.tag_factors {
            factor.validate()?;
        }

        let file_name = self.archive_name();
        let output_path = format!("{}/{}", self.output.path, file_name);

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

            zip.start_file::<_, ()>(FACTORS_FILE, FileOptions::default())?;
            zip.write_all(serde_json::to_string_pretty(&batch.tag_factors)?.as_bytes())?;

            zip.start_file::<_, ()>(OBSERVATIONS_FILE, FileOptions::default())?;
            zip.write_all(&render_observations_csv(&batch.tag_factors)?)?;

            if self.output.include_base {
                zip.start_file::<_, ()>(BASE_FACTOR_FILE, FileOptions::default())?;
                zip.write_all(serde_json::to_string_pretty(&batch.base)?.as_bytes())?;
            }

            zip.finish()?.into_inner()
        };

        tracing::debug!("Writing {} ({} bytes) to storage", file_name, zip_data.len());
        self.storage.write_file(&file_name, &zip_data).await?;
        Ok(output_path)
    }
}
