use nexintel::config::app_config::ConfigOrigin;
use nexintel::utils::validation::Validate;
use nexintel::{AppConfig, CliArgs, TagSplitConfig};
use std::path::PathBuf;

fn config_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config")
}

#[test]
fn test_shipped_dev_config_is_valid() {
    let (config, origin) = AppConfig::load_from(&config_dir(), Some("dev"), None).unwrap();

    assert!(matches!(origin, ConfigOrigin::Layered { .. }));
    assert_eq!(config.app.env, "dev");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(
        config.logging.module_levels.get("nexintel::adapters").map(String::as_str),
        Some("info")
    );
    assert!(config.output.include_base);
    assert!(!config.data_sources.dune.enabled);
    config.validate().unwrap();
}

#[test]
fn test_shipped_prod_config_is_valid() {
    let (config, _) = AppConfig::load_from(&config_dir(), Some("production"), None).unwrap();

    assert_eq!(config.app.env, "production");
    assert_eq!(config.logging.format, "json");
    assert!(config.data_sources.dune.enabled);
    assert_eq!(config.data_sources.dune.query_ids.len(), 2);
    assert_eq!(config.agents.news_data_agent.temperature, 0.1);
    assert_eq!(config.agents.news_data_agent.model, "deepseek-chat");
    config.validate().unwrap();
}

#[test]
fn test_shipped_split_settings_match_defaults() {
    let (config, _) = AppConfig::load_from(&config_dir(), Some("dev"), None).unwrap();
    let split = TagSplitConfig::from(&config.agents.news_data_agent.split_by_tags);
    assert_eq!(split, TagSplitConfig::default());
}

#[test]
fn test_cli_overrides_apply_after_loading() {
    let args = CliArgs {
        env: Some("prod".to_string()),
        preference: Some("stablecoins".to_string()),
        no_split: true,
        ..CliArgs::default()
    };
    let (mut config, _) = args.load_config(&config_dir()).unwrap();
    args.apply_to(&mut config);

    assert_eq!(config.app.env, "prod");
    assert_eq!(
        config.agents.news_data_agent.preference.as_deref(),
        Some("stablecoins")
    );
    assert!(!config.agents.news_data_agent.split_by_tags.enabled);
    config.validate().unwrap();
}
