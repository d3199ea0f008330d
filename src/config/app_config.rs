use crate::factors::tag_split::{DEFAULT_FALLBACK_TAG, DEFAULT_TAG_PRIORITY};
use crate::utils::error::{FactorError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const DEFAULT_CONFIG_DIR: &str = "config";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
    pub secrets: SecretsConfig,
    pub data_sources: DataSourcesConfig,
    pub agents: AgentsConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub env: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "NexIntel".to_string(),
            env: "dev".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `compact` or `json`
    pub format: String,
    pub file: bool,
    /// Per-module overrides, e.g. `"nexintel::agents" = "debug"`.
    pub module_levels: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            file: true,
            module_levels: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub logs_dir: String,
    pub cache_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            logs_dir: "./logs".to_string(),
            cache_dir: "./cache".to_string(),
        }
    }
}

/// Names of the environment variables that hold API keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    pub coindesk_api_key_env: String,
    pub deepseek_api_key_env: String,
    pub dune_api_key_env: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            coindesk_api_key_env: "COINDESK_API_KEY".to_string(),
            deepseek_api_key_env: "DEEPSEEK_API_KEY".to_string(),
            dune_api_key_env: "DUNE_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourcesConfig {
    pub coindesk: CoinDeskConfig,
    pub dune: DuneConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinDeskConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub timeout_sec: u64,
    pub fetch: FetchDefaults,
}

impl Default for CoinDeskConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            timeout_sec: 20,
            fetch: FetchDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchDefaults {
    pub lang: String,
    pub categories: Vec<String>,
    pub exclude_categories: Vec<String>,
    pub source_ids: Vec<String>,
    pub limit: u32,
    pub to_ts: i64,
}

impl Default for FetchDefaults {
    fn default() -> Self {
        Self {
            lang: "EN".to_string(),
            categories: Vec::new(),
            exclude_categories: Vec::new(),
            source_ids: Vec::new(),
            limit: 10,
            to_ts: -1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuneConfig {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_sec: u64,
    pub query_ids: BTreeMap<String, u64>,
    pub cache_ttl_hours: u64,
}

impl Default for DuneConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.dune.com/api/v1".to_string(),
            timeout_sec: 20,
            query_ids: BTreeMap::from([
                ("Layer 1".to_string(), 3682694),
                ("Layer 2".to_string(), 3682730),
            ]),
            cache_ttl_hours: 12,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub news_data_agent: NewsAgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsAgentConfig {
    pub name: String,
    pub preference: Option<String>,
    pub max_obs: usize,
    pub max_tokens_factor: usize,
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub timeout_sec: u64,
    pub llm_max_output_tokens: u32,
    pub split_by_tags: SplitByTagsConfig,
}

impl Default for NewsAgentConfig {
    fn default() -> Self {
        Self {
            name: "NewsDataAgent".to_string(),
            preference: None,
            max_obs: 7,
            max_tokens_factor: 4000,
            model: "deepseek-chat".to_string(),
            base_url: "https://api.deepseek.com".to_string(),
            temperature: 0.2,
            timeout_sec: 60,
            llm_max_output_tokens: 1200,
            split_by_tags: SplitByTagsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitByTagsConfig {
    pub enabled: bool,
    pub priority: Vec<String>,
    pub per_factor_limits: PerFactorLimits,
    pub fallback_tag: String,
}

impl Default for SplitByTagsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: DEFAULT_TAG_PRIORITY.iter().map(|t| t.to_string()).collect(),
            per_factor_limits: PerFactorLimits::default(),
            fallback_tag: DEFAULT_FALLBACK_TAG.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerFactorLimits {
    pub max_obs: usize,
    pub max_tokens_factor: usize,
}

impl Default for PerFactorLimits {
    fn default() -> Self {
        Self {
            max_obs: 7,
            max_tokens_factor: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
    pub include_base: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "./output".to_string(),
            include_base: false,
        }
    }
}

/// Where the loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    Explicit(PathBuf),
    Layered { base: PathBuf, overlay: PathBuf },
    Fallback(PathBuf),
    BuiltIn,
}

impl AppConfig {
    /// Loads the configuration using `APP_CONFIG` / `APP_ENV` and `./config`.
    pub fn load() -> Result<(Self, ConfigOrigin)> {
        let env = std::env::var("APP_ENV").ok();
        let explicit = std::env::var("APP_CONFIG").ok();
        Self::load_from(Path::new(DEFAULT_CONFIG_DIR), env.as_deref(), explicit.as_deref())
    }

    /// Precedence: explicit file, then `base.toml` + `<env>.toml`, then
    /// `default.toml`, then built-in defaults.
    pub fn load_from(
        config_dir: &Path,
        env: Option<&str>,
        explicit_path: Option<&str>,
    ) -> Result<(Self, ConfigOrigin)> {
        let env = env
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "dev".to_string());

        let (table, origin) = if let Some(path) = explicit_path {
            let path = PathBuf::from(path);
            let table = read_toml_table(&path)?.ok_or_else(|| FactorError::ConfigError {
                message: format!("APP_CONFIG file not found: {}", path.display()),
            })?;
            tracing::info!("Loaded config from APP_CONFIG: {} (env={})", path.display(), env);
            (table, ConfigOrigin::Explicit(path))
        } else {
            let base_path = config_dir.join("base.toml");
            let overlay_path = match env.as_str() {
                "prod" | "production" => Some(config_dir.join("prod.toml")),
                "dev" | "development" => Some(config_dir.join("dev.toml")),
                _ => None,
            };

            let layered = match overlay_path {
                Some(overlay_path) if base_path.exists() && overlay_path.exists() => {
                    let base = read_toml_table(&base_path)?.unwrap_or_default();
                    let overlay = read_toml_table(&overlay_path)?.unwrap_or_default();
                    tracing::info!(
                        "Loaded config: base={} + override={} (env={})",
                        base_path.display(),
                        overlay_path.display(),
                        env
                    );
                    Some((
                        deep_merge(base, overlay),
                        ConfigOrigin::Layered {
                            base: base_path,
                            overlay: overlay_path,
                        },
                    ))
                }
                _ => None,
            };

            match layered {
                Some(layered) => layered,
                None => {
                    let default_path = config_dir.join("default.toml");
                    match read_toml_table(&default_path)? {
                        Some(table) => {
                            tracing::warn!(
                                "Loaded fallback config: {} (env={})",
                                default_path.display(),
                                env
                            );
                            (table, ConfigOrigin::Fallback(default_path))
                        }
                        None => {
                            tracing::warn!("No config files found; using built-in defaults (env={})", env);
                            (toml::Table::new(), ConfigOrigin::BuiltIn)
                        }
                    }
                }
            }
        };

        let mut config: AppConfig = toml::Value::Table(table).try_into()?;
        config.app.env = env;
        Ok((config, origin))
    }

    /// Parses a single TOML document (with `${VAR}` substitution).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content);
        Ok(toml::from_str(&processed)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn api_key(env_name: &str) -> Option<String> {
        std::env::var(env_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

fn read_toml_table(path: &Path) -> Result<Option<toml::Table>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let processed = substitute_env_vars(&content);
    Ok(Some(toml::from_str(&processed)?))
}

/// Replaces `${VAR_NAME}` with the environment value; unknown vars stay as is.
pub fn substitute_env_vars(content: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
}

/// Recursively merges `overlay` into `base`. Tables merge; everything else,
/// arrays included, is replaced.
pub fn deep_merge(mut base: toml::Table, overlay: toml::Table) -> toml::Table {
    for (key, value) in overlay {
        match (base.remove(&key), value) {
            (Some(toml::Value::Table(b)), toml::Value::Table(o)) => {
                base.insert(key, toml::Value::Table(deep_merge(b, o)));
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
    base
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        let coindesk = &self.data_sources.coindesk;
        if coindesk.enabled {
            let base_url = validation::validate_required_field(
                "data_sources.coindesk.base_url",
                &coindesk.base_url,
            )?;
            validation::validate_url("data_sources.coindesk.base_url", base_url)?;
            validation::validate_positive_number(
                "data_sources.coindesk.fetch.limit",
                coindesk.fetch.limit as usize,
                1,
            )?;
        }

        let dune = &self.data_sources.dune;
        if dune.enabled {
            validation::validate_url("data_sources.dune.base_url", &dune.base_url)?;
            if dune.query_ids.is_empty() {
                return Err(FactorError::InvalidConfigValueError {
                    field: "data_sources.dune.query_ids".to_string(),
                    value: "{}".to_string(),
                    reason: "At least one query id is required".to_string(),
                });
            }
        }

        if !coindesk.enabled && !dune.enabled {
            return Err(FactorError::ConfigError {
                message: "No data source enabled".to_string(),
            });
        }

        let agent = &self.agents.news_data_agent;
        validation::validate_non_empty_string("agents.news_data_agent.name", &agent.name)?;
        validation::validate_url("agents.news_data_agent.base_url", &agent.base_url)?;
        validation::validate_positive_number("agents.news_data_agent.max_obs", agent.max_obs, 1)?;
        validation::validate_positive_number(
            "agents.news_data_agent.max_tokens_factor",
            agent.max_tokens_factor,
            1,
        )?;
        validation::validate_range("agents.news_data_agent.temperature", agent.temperature, 0.0, 2.0)?;

        let split = &agent.split_by_tags;
        validation::validate_non_empty_string(
            "agents.news_data_agent.split_by_tags.fallback_tag",
            &split.fallback_tag,
        )?;
        validation::validate_positive_number(
            "agents.news_data_agent.split_by_tags.per_factor_limits.max_obs",
            split.per_factor_limits.max_obs,
            1,
        )?;
        validation::validate_positive_number(
            "agents.news_data_agent.split_by_tags.per_factor_limits.max_tokens_factor",
            split.per_factor_limits.max_tokens_factor,
            1,
        )?;

        validation::validate_path("output.path", &self.output.path)?;
        validation::validate_path("paths.logs_dir", &self.paths.logs_dir)?;

        for (field, level) in std::iter::once(("logging.level".to_string(), &self.logging.level))
            .chain(
                self.logging
                    .module_levels
                    .iter()
                    .map(|(module, level)| (format!("logging.module_levels.{}", module), level)),
            )
        {
            if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
                return Err(FactorError::InvalidConfigValueError {
                    field,
                    value: level.clone(),
                    reason: "Expected one of trace, debug, info, warn, error".to_string(),
                });
            }
        }

        Ok(())
    }
}
