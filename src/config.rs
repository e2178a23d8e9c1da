use crate::error::{JoinError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix for environment variable overrides, e.g. `CPS_JOIN_SCHEDULER__MAX_TURNS`
pub const ENV_PREFIX: &str = "CPS_JOIN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    pub environment: String,
    pub logging: LoggingConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive. Derived from the environment when unset.
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on turns for `ManualScheduler::run_until_idle`
    pub max_turns: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_turns: 10_000 }
    }
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            environment: detect_environment(),
            logging: LoggingConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl JoinConfig {
    /// Defaults overridden by `CPS_JOIN_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Defaults, then `file` (format inferred from its extension), then
    /// `CPS_JOIN_*` environment variables
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().set_default("environment", detect_environment())?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: JoinConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduler.max_turns == 0 {
            return Err(JoinError::Configuration(
                "scheduler.max_turns must be positive".to_string(),
            ));
        }

        if let Some(level) = &self.logging.level {
            tracing_subscriber::EnvFilter::try_new(level).map_err(|e| {
                JoinError::Configuration(format!("Invalid logging.level '{level}': {e}"))
            })?;
        }

        Ok(())
    }

    /// Configured log level, or the environment's default
    pub fn log_level(&self) -> String {
        self.logging
            .level
            .clone()
            .unwrap_or_else(|| default_log_level(&self.environment).to_string())
    }
}

/// Current environment name from `CPS_JOIN_ENV` or `APP_ENV`
pub fn detect_environment() -> String {
    std::env::var("CPS_JOIN_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

pub fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "test" | "development" => "debug",
        "production" => "info",
        _ => "debug",
    }
}
