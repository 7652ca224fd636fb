use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use restaurant_selection::SelectionConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "decide.toml";
pub const ENV_PREFIX: &str = "DECIDE_";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub selection: SelectionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `restaurant_selection=debug`. `RUST_LOG` takes precedence.
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Command line settings, applied over every other source.
#[derive(Clone, Debug, Default, clap::Args)]
pub struct Overrides {
    /// Weight of a restaurant selected today, in (0, 1].
    #[arg(long)]
    pub min_weight: Option<f64>,
    /// Days until a selected restaurant is back to full weight.
    #[arg(long)]
    pub recovery_window_days: Option<f64>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// `pretty` or `json`.
    #[arg(long)]
    pub log_format: Option<String>,
}

impl Overrides {
    fn merge_into(&self, figment: Figment) -> Figment {
        let mut figment = figment;
        if let Some(min_weight) = self.min_weight {
            figment = figment.merge(Serialized::default("selection.min_weight", min_weight));
        }
        if let Some(days) = self.recovery_window_days {
            figment = figment.merge(Serialized::default("selection.recovery_window_days", days));
        }
        if let Some(level) = &self.log_level {
            figment = figment.merge(Serialized::default("logging.level", level));
        }
        if let Some(format) = &self.log_format {
            figment = figment.merge(Serialized::default("logging.format", format));
        }
        figment
    }
}

impl SimulatorConfig {
    /// Precedence, highest first: command line `overrides`, `DECIDE_*` environment variables, the
    /// config file, defaults. Nested keys use `__`, e.g. `DECIDE_SELECTION__MIN_WEIGHT=0.2`.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        let config: Self = overrides
            .merge_into(figment)
            .extract()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        config.selection.validate()?;
        Ok(config)
    }
}

pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.level.trim().is_empty() {
            EnvFilter::new("info")
        } else {
            EnvFilter::new(config.level.clone())
        }
    });
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        _ => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
    .context("failed to initialize tracing")
}
