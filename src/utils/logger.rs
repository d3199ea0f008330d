use crate::config::app_config::LoggingConfig;
use crate::utils::error::{FactorError, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Builds the filter directive from the configured level plus per-module
/// overrides. `verbose` forces the crate itself to debug.
pub fn filter_directives(cfg: &LoggingConfig, verbose: bool) -> String {
    let mut directives = vec![cfg.level.to_lowercase()];
    for (module, level) in &cfg.module_levels {
        directives.push(format!("{}={}", module, level.to_lowercase()));
    }
    if verbose {
        directives.push("nexintel=debug".to_string());
    }
    directives.join(",")
}

/// Console logging plus an optional `<logs_dir>/<app>.log` file. `RUST_LOG`
/// overrides the configured levels. Returns the log file path, if any.
pub fn init_logger(
    cfg: &LoggingConfig,
    app_name: &str,
    logs_dir: &str,
    verbose: bool,
) -> Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(cfg, verbose)));
    let json = cfg.format.eq_ignore_ascii_case("json");

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console = tracing_subscriber::fmt::layer()
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    layers.push(if json {
        console.json().boxed()
    } else {
        console.compact().boxed()
    });

    let mut file_path = None;
    if cfg.file {
        let dir = Path::new(logs_dir);
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.log", app_name.to_lowercase()));
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file));
        layers.push(if json {
            file_layer.json().boxed()
        } else {
            file_layer.boxed()
        });
        file_path = Some(path);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| FactorError::ConfigError {
            message: format!("Failed to initialize logging: {}", e),
        })?;

    tracing::debug!(
        "Logging configured: level={} format={} file={:?}",
        cfg.level,
        cfg.format,
        file_path
    );
    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_filter_directives() {
        let cfg = LoggingConfig {
            level: "INFO".to_string(),
            module_levels: BTreeMap::from([
                ("nexintel::agents".to_string(), "DEBUG".to_string()),
                ("reqwest".to_string(), "warn".to_string()),
            ]),
            ..LoggingConfig::default()
        };
        assert_eq!(
            filter_directives(&cfg, false),
            "info,nexintel::agents=debug,reqwest=warn"
        );
        assert!(filter_directives(&cfg, true).ends_with(",nexintel=debug"));
    }
}
