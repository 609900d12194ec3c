use std::time::Duration;

use reqwest::Url;

use crate::core::{DEFAULT_QUIESCENCE_WINDOW, Fraction};

pub const ENGINE_URL_ENV: &str = "HYPOFIN_ENGINE_URL";
pub const ENGINE_TIMEOUT_ENV: &str = "HYPOFIN_ENGINE_TIMEOUT_MS";
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("HYPOFIN_ENGINE_URL is not set")]
    MissingEndpoint,
    #[error("invalid engine url '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("engine timeout must be a positive number of milliseconds, got '{0}'")]
    InvalidTimeout(String),
}

/// Where the simulation engine lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub endpoint: Url,
    pub timeout: Duration,
}

impl EngineConfig {
    pub fn new(endpoint: &str) -> Result<Self, ConfigError> {
        Ok(EngineConfig {
            endpoint: parse_endpoint(endpoint)?,
            timeout: DEFAULT_ENGINE_TIMEOUT,
        })
    }

    /// Reads `HYPOFIN_ENGINE_URL` and the optional `HYPOFIN_ENGINE_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = lookup(ENGINE_URL_ENV).ok_or(ConfigError::MissingEndpoint)?;
        let mut config = Self::new(&endpoint)?;
        if let Some(raw) = lookup(ENGINE_TIMEOUT_ENV) {
            config.timeout = parse_timeout_ms(&raw)?;
        }
        Ok(config)
    }
}

pub fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidEndpoint {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidEndpoint {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn parse_timeout_ms(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidTimeout(raw.to_string())),
    }
}

/// Session tuning: the slider quiescence window and the starting slider
/// positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub debounce_window: Duration,
    pub initial_saved_fraction: Fraction,
    pub initial_risk_preference: Fraction,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            debounce_window: DEFAULT_QUIESCENCE_WINDOW,
            initial_saved_fraction: Fraction::clamped(0.5),
            initial_risk_preference: Fraction::clamped(0.5),
        }
    }
}
