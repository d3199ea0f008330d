use crate::core::{FactorBatch, Pipeline};
use crate::utils::error::Result;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting factor run...");
        let started = Instant::now();

        let batch = self.build().await?;

        let phase = Instant::now();
        let output_path = self.pipeline.load(batch).await?;
        tracing::info!("Load finished in {:?}: {}", phase.elapsed(), output_path);

        tracing::info!("Factor run completed in {:?}", started.elapsed());
        Ok(output_path)
    }

    /// Extract and transform only; nothing is written.
    pub async fn build(&self) -> Result<FactorBatch> {
        let phase = Instant::now();
        let events = self.pipeline.extract().await?;
        tracing::info!("Extracted {} events in {:?}", events.len(), phase.elapsed());

        let phase = Instant::now();
        let batch = self.pipeline.transform(events).await?;
        let observations: usize = batch
            .tag_factors
            .iter()
            .map(|f| f.observations.len())
            .sum();
        tracing::info!(
            "Built {} factor(s) with {} observations in {:?}",
            batch.tag_factors.len(),
            observations,
            phase.elapsed()
        );

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Event, TextualFactor};
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPipeline {
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait::async_trait]
    impl Pipeline for RecordingPipeline {
        async fn extract(&self) -> Result<Vec<Event>> {
            self.calls.lock().unwrap().push("extract");
            Ok(vec![Event::new("S", "t", "c")])
        }

        async fn transform(&self, events: Vec<Event>) -> Result<FactorBatch> {
            self.calls.lock().unwrap().push("transform");
            let base = TextualFactor {
                date: Utc::now(),
                agent_name: "A".to_string(),
                observations: vec![],
                length_tokens: 0,
                preference: None,
                raw_sources: events,
            };
            Ok(FactorBatch {
                tag_factors: vec![base.clone()],
                base,
            })
        }

        async fn load(&self, _batch: FactorBatch) -> Result<String> {
            self.calls.lock().unwrap().push("load");
            Ok("out/factors.zip".to_string())
        }
    }

    #[tokio::test]
    async fn test_run_executes_phases_in_order() {
        let engine = EtlEngine::new(RecordingPipeline::default());
        let path = engine.run().await.unwrap();

        assert_eq!(path, "out/factors.zip");
        assert_eq!(
            *engine.pipeline().calls.lock().unwrap(),
            vec!["extract", "transform", "load"]
        );
    }

    #[tokio::test]
    async fn test_build_skips_load() {
        let engine = EtlEngine::new(RecordingPipeline::default());
        let batch = engine.build().await.unwrap();

        assert_eq!(batch.base.raw_sources.len(), 1);
        assert_eq!(
            *engine.pipeline().calls.lock().unwrap(),
            vec!["extract", "transform"]
        );
    }
}
