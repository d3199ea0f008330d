pub mod app_config;
pub mod cli;

pub use app_config::{AppConfig, ConfigOrigin};

use chrono::{DateTime, Duration, NaiveDate, Utc};

#[cfg(feature = "cli")]
use clap::Parser;

/// Command-line overrides on top of the TOML configuration.
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "nexintel"))]
#[cfg_attr(
    feature = "cli",
    command(about = "Builds daily textual factors from crypto news")
)]
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Config file to load instead of the layered `config/` directory
    #[cfg_attr(feature = "cli", arg(long))]
    pub config: Option<String>,

    /// Environment overlay (dev, prod)
    #[cfg_attr(feature = "cli", arg(long))]
    pub env: Option<String>,

    /// Preference keyword used to filter news
    #[cfg_attr(feature = "cli", arg(long))]
    pub preference: Option<String>,

    /// Factor date as YYYY-MM-DD (defaults to now)
    #[cfg_attr(feature = "cli", arg(long))]
    pub date: Option<NaiveDate>,

    /// Output directory for the factor bundle
    #[cfg_attr(feature = "cli", arg(long))]
    pub output: Option<String>,

    #[cfg_attr(feature = "cli", arg(long, help = "Enable verbose output"))]
    pub verbose: bool,

    #[cfg_attr(
        feature = "cli",
        arg(long, help = "Print factors without writing the bundle")
    )]
    pub dry_run: bool,

    #[cfg_attr(feature = "cli", arg(long, help = "Keep the agent factor whole"))]
    pub no_split: bool,
}

impl CliArgs {
    /// Config resolution: flags win over `APP_CONFIG` / `APP_ENV`.
    pub fn load_config(&self, config_dir: &std::path::Path) -> crate::Result<(AppConfig, ConfigOrigin)> {
        let env = self.env.clone().or_else(|| std::env::var("APP_ENV").ok());
        let explicit = self.config.clone().or_else(|| std::env::var("APP_CONFIG").ok());
        AppConfig::load_from(config_dir, env.as_deref(), explicit.as_deref())
    }

    pub fn apply_to(&self, config: &mut AppConfig) {
        let agent = &mut config.agents.news_data_agent;
        if let Some(preference) = &self.preference {
            agent.preference = Some(preference.clone());
        }
        if self.no_split {
            agent.split_by_tags.enabled = false;
        }
        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }
    }

    /// Midnight UTC of `--date`, or the current instant.
    pub fn run_date(&self) -> DateTime<Utc> {
        self.date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now)
    }

    /// `[midnight, next midnight)` of `--date`; open on both ends without it.
    pub fn fetch_window(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match self.date {
            Some(_) => {
                let start = self.run_date();
                (Some(start), Some(start + Duration::days(1)))
            }
            None => (None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_apply_to_overrides() {
        let args = CliArgs {
            preference: Some("etf".to_string()),
            output: Some("/tmp/factors".to_string()),
            no_split: true,
            ..CliArgs::default()
        };
        let mut config = AppConfig::default();
        args.apply_to(&mut config);

        assert_eq!(config.agents.news_data_agent.preference.as_deref(), Some("etf"));
        assert!(!config.agents.news_data_agent.split_by_tags.enabled);
        assert_eq!(config.output.path, "/tmp/factors");
    }

    #[test]
    fn test_apply_to_keeps_config_without_flags() {
        let mut config = AppConfig::default();
        config.agents.news_data_agent.preference = Some("macro".to_string());
        CliArgs::default().apply_to(&mut config);

        assert_eq!(config.agents.news_data_agent.preference.as_deref(), Some("macro"));
        assert!(config.agents.news_data_agent.split_by_tags.enabled);
    }

    #[test]
    fn test_run_date() {
        let args = CliArgs {
            date: NaiveDate::from_ymd_opt(2025, 9, 14),
            ..CliArgs::default()
        };
        assert_eq!(args.run_date(), Utc.with_ymd_and_hms(2025, 9, 14, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_fetch_window_covers_the_date() {
        let args = CliArgs {
            date: NaiveDate::from_ymd_opt(2025, 9, 14),
            ..CliArgs::default()
        };
        let (start, end) = args.fetch_window();
        assert_eq!(start, Some(Utc.with_ymd_and_hms(2025, 9, 14, 0, 0, 0).unwrap()));
        assert_eq!(end, Some(Utc.with_ymd_and_hms(2025, 9, 15, 0, 0, 0).unwrap()));

        assert_eq!(CliArgs::default().fetch_window(), (None, None));
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "nexintel",
            "--env",
            "prod",
            "--date",
            "2025-09-14",
            "--dry-run",
            "--no-split",
        ]);
        assert_eq!(args.env.as_deref(), Some("prod"));
        assert_eq!(args.date, NaiveDate::from_ymd_opt(2025, 9, 14));
        assert!(args.dry_run);
        assert!(args.no_split);
        assert!(!args.verbose);
    }
}
