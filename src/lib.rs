pub mod adapters;
pub mod agents;
pub mod config;
pub mod core;
pub mod domain;
pub mod factors;
pub mod utils;

pub use adapters::{CoinDeskSource, DeepSeekClient, DuneSocialSource};
pub use agents::NewsDataAgent;
pub use config::{cli::LocalStorage, AppConfig, CliArgs};
pub use core::{etl::EtlEngine, pipeline::FactorPipeline};
pub use factors::{TagSplitConfig, TagSplitter};
pub use utils::error::{FactorError, Result};
