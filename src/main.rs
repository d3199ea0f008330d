use clap::Parser;
use nexintel::config::app_config::DEFAULT_CONFIG_DIR;
use nexintel::domain::ports::NewsSource;
use nexintel::utils::error::ErrorSeverity;
use nexintel::utils::{logger, validation::Validate};
use nexintel::{
    AppConfig, CliArgs, CoinDeskSource, DeepSeekClient, DuneSocialSource, EtlEngine,
    FactorError, FactorPipeline, LocalStorage, NewsDataAgent, Result, TagSplitConfig, TagSplitter,
};
use std::path::Path;

fn build_sources(config: &AppConfig) -> Result<Vec<Box<dyn NewsSource>>> {
    let mut sources: Vec<Box<dyn NewsSource>> = Vec::new();
    let data_sources = &config.data_sources;

    if data_sources.coindesk.enabled {
        sources.push(Box::new(CoinDeskSource::from_config(
            &data_sources.coindesk,
            &config.secrets,
        )?));
    }
    if data_sources.dune.enabled {
        sources.push(Box::new(DuneSocialSource::from_config(
            &data_sources.dune,
            &config.secrets,
            &config.paths.cache_dir,
        )?));
    }

    Ok(sources)
}

async fn run(args: &CliArgs, config: AppConfig) -> Result<()> {
    let agent_cfg = &config.agents.news_data_agent;
    let client = DeepSeekClient::from_config(agent_cfg, &config.secrets)?;
    tracing::info!("LLM client ready: model={}", client.model());
    let agent = NewsDataAgent::from_config(agent_cfg, client);

    let date = args.run_date();
    let (start, end) = args.fetch_window();

    let storage = LocalStorage::new(&config.output.path);
    let splitter = TagSplitter::new(TagSplitConfig::from(&agent_cfg.split_by_tags));
    let pipeline = FactorPipeline::new(storage, agent, build_sources(&config)?, splitter, date)
        .with_window(start, end)
        .with_output(config.output.clone());
    let engine = EtlEngine::new(pipeline);

    if args.dry_run {
        let batch = engine.build().await?;
        tracing::info!("Dry run: {} factor(s) not written", batch.tag_factors.len());
        for factor in &batch.tag_factors {
            println!("{}", factor);
        }
        return Ok(());
    }

    let output_path = engine.run().await?;
    tracing::info!("✅ Factor run completed successfully!");
    tracing::info!("📁 Output saved to: {}", output_path);
    println!("✅ Factor run completed successfully!");
    println!("📁 Output saved to: {}", output_path);
    Ok(())
}

fn report(e: &FactorError) -> i32 {
    tracing::error!(
        "❌ Factor run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();
    let args = CliArgs::parse();

    let (mut config, origin) = match args.load_config(Path::new(DEFAULT_CONFIG_DIR)) {
        Ok(loaded) => loaded,
        Err(e) => std::process::exit(report(&e)),
    };
    args.apply_to(&mut config);

    let log_file = match logger::init_logger(
        &config.logging,
        &config.app.name,
        &config.paths.logs_dir,
        args.verbose,
    ) {
        Ok(path) => path,
        Err(e) => std::process::exit(report(&e)),
    };

    tracing::info!(
        "Starting {} (env={}, config={:?})",
        config.app.name,
        config.app.env,
        origin
    );
    if let Some(path) = log_file {
        tracing::debug!("Log file: {}", path.display());
    }
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        std::process::exit(report(&e));
    }

    if let Err(e) = run(&args, config).await {
        let exit_code = report(&e);
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}
