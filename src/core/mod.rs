pub mod etl;
pub mod pipeline;

pub use crate::domain::model::{Event, FactorBatch, TextualFactor};
pub use crate::domain::ports::{Agent, LlmClient, NewsSource, Pipeline, Storage};
pub use crate::utils::error::Result;
