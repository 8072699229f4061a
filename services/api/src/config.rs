use lesson_core::Pacing;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    /// A lesson document to serve instead of the built-in course.
    pub lesson_path: Option<PathBuf>,
    pub pacing: Pacing,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_millis(name: &str, default: u64) -> Result<Duration, ConfigError> {
    let raw = var_or(name, &default.to_string());
    raw.parse::<u64>().map(Duration::from_millis).map_err(|_| {
        ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a whole number of milliseconds", raw),
        )
    })
}

fn parse_flag(name: &str, default: bool) -> Result<bool, ConfigError> {
    let raw = var_or(name, &default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a boolean", raw),
        )),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let lesson_path = std::env::var("LESSON_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let pacing = Pacing {
            per_char: parse_millis("COMPOSE_MS_PER_CHAR", 20)?,
            max_compose: parse_millis("COMPOSE_MAX_MS", 1500)?,
            settle_actions: parse_flag("ACTION_PACING", true)?,
        };

        Ok(Self {
            bind_address,
            log_level,
            lesson_path,
            pacing,
        })
    }
}
