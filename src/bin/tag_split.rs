use anyhow::{Context, Result};
use clap::Parser;
use nexintel::domain::model::TextualFactor;
use nexintel::{AppConfig, TagSplitConfig, TagSplitter};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "tag_split")]
#[command(about = "Split a saved textual factor into single-tag factors")]
struct Args {
    /// JSON file holding one factor
    input: PathBuf,

    /// Config file providing `agents.news_data_agent.split_by_tags`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated tag priority, highest first
    #[arg(long, value_delimiter = ',')]
    priority: Vec<String>,

    #[arg(long)]
    max_obs: Option<usize>,

    #[arg(long)]
    max_tokens: Option<usize>,

    /// Write the resulting factors here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, help = "Enable verbose output")]
    verbose: bool,
}

impl Args {
    fn split_config(&self) -> Result<TagSplitConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let app = AppConfig::from_file(path)
                    .with_context(|| format!("loading config {}", path.display()))?;
                TagSplitConfig::from(&app.agents.news_data_agent.split_by_tags)
            }
            None => TagSplitConfig::default(),
        };

        // This tool always splits, whatever the config says.
        config.enabled = true;
        if !self.priority.is_empty() {
            config.priority = self.priority.clone();
        }
        if let Some(max_obs) = self.max_obs {
            config.max_obs_per_factor = max_obs;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens_factor = max_tokens;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let factor: TextualFactor = serde_json::from_str(&raw)
        .with_context(|| format!("parsing factor from {}", args.input.display()))?;

    let splitter = TagSplitter::new(args.split_config()?);
    let factors = splitter.split(factor);
    let rendered = serde_json::to_string_pretty(&factors)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!("Wrote {} factor(s) to {}", factors.len(), path.display());
        }
        None => println!("{}", rendered),
    }

    for factor in &factors {
        eprintln!("{}", factor);
    }

    Ok(())
}
