//! Configuration layer: typed settings with layered precedence (file → env
//! → CLI).

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::registry::FallbackPolicy;

const DEFAULT_CONFIG_BASENAME: &str = "rigenera";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CONTENT_DIR: &str = "content";
const DEFAULT_MAX_ARTIFACTS: usize = 1024;
const DEFAULT_REVALIDATE_SECS: i64 = 60;
const DEFAULT_MAX_REGEN_MS: u64 = 10_000;

/// Command-line arguments for the rigenera binary.
#[derive(Debug, Parser)]
#[command(name = "rigenera", version, about = "Incremental page regeneration server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "RIGENERA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve,
    /// Render a single key to stdout and exit.
    Render(RenderArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    /// Route key to render, e.g. `/guides/setup`.
    pub key: String,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {message}")]
    Validation { message: String },
}

impl SettingsError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub cache: CacheSettings,
    pub content: ContentSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Capacity bound for the in-memory artifact store.
    pub max_artifacts: usize,
    /// Seconds before a cached page goes stale. Omit for never-stale.
    pub revalidate_after_secs: Option<i64>,
    /// Policy for keys not listed in `known_paths`.
    pub fallback: FallbackPolicy,
    /// Upper bound on a single regeneration attempt, in milliseconds.
    pub max_regen_ms: u64,
    /// Keys enumerated at deploy time; always eligible for generation.
    pub known_paths: Vec<String>,
    /// Pre-generate every known path before accepting traffic.
    pub warm_on_startup: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_artifacts: DEFAULT_MAX_ARTIFACTS,
            revalidate_after_secs: Some(DEFAULT_REVALIDATE_SECS),
            fallback: FallbackPolicy::Block,
            max_regen_ms: DEFAULT_MAX_REGEN_MS,
            known_paths: Vec::new(),
            warm_on_startup: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentSettings {
    /// Directory holding the markdown sources served by the default
    /// renderer.
    pub dir: PathBuf,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_CONTENT_DIR),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
        }
    }
}

/// Parse the CLI and load settings with its `--config-file` override.
pub fn load_with_cli() -> Result<(CliArgs, Settings), SettingsError> {
    let cli = CliArgs::parse();
    let settings = load(cli.config_file.as_deref())?;
    Ok((cli, settings))
}

/// Load settings: optional TOML file, then `RIGENERA__*` environment
/// overrides, then validation.
pub fn load(config_file: Option<&Path>) -> Result<Settings, SettingsError> {
    let builder = match config_file {
        Some(path) => Config::builder().add_source(File::from(path.to_path_buf())),
        None => Config::builder()
            .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false)),
    };

    let raw = builder
        .add_source(Environment::with_prefix("RIGENERA").separator("__"))
        .build()?;

    let settings: Settings = raw.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    /// Reject invalid values at load time; request handling assumes these
    /// hold.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Some(secs) = self.cache.revalidate_after_secs {
            if secs < 0 {
                return Err(SettingsError::validation(format!(
                    "cache.revalidate_after_secs must be >= 0, got {secs}"
                )));
            }
        }

        if self.cache.max_regen_ms == 0 {
            return Err(SettingsError::validation(
                "cache.max_regen_ms must be greater than zero",
            ));
        }

        for path in &self.cache.known_paths {
            if !path.starts_with('/') {
                return Err(SettingsError::validation(format!(
                    "cache.known_paths entries must start with `/`, got `{path}`"
                )));
            }
        }

        Ok(())
    }
}
