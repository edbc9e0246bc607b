//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use crate::error::AppError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Text-generation backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// API key; `None` means the gateway cannot be constructed
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama3-8b-8192".to_string(),
            temperature: 0.2,
            max_tokens: Some(512),
        }
    }
}

/// Remediation planner configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Upper bound on concurrent gateway calls
    pub max_concurrency: usize,
    /// Per-column deadline for a gateway call
    pub request_timeout: Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Input file locations
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    pub previous_schema: PathBuf,
    pub current_schema: PathBuf,
    pub script: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            previous_schema: PathBuf::from("sample_data/previous_schema.json"),
            current_schema: PathBuf::from("sample_data/current_schema.json"),
            script: PathBuf::from("scripts/transform.py"),
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub gateway: GatewayConfig,
    pub planner: PlannerConfig,
    pub paths: PathsConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let base_url = match lookup("GROQ_BASE_URL") {
            Some(raw) => Self::parse_base_url(&raw)?,
            None => defaults.gateway.base_url,
        };

        let temperature = match lookup("REMEDIATION_TEMPERATURE") {
            Some(raw) => {
                let value: f32 = parse_value("REMEDIATION_TEMPERATURE", &raw)?;
                if !(0.0..=2.0).contains(&value) {
                    return Err(ConfigError::InvalidValue(format!(
                        "REMEDIATION_TEMPERATURE must be between 0.0 and 2.0, got {}",
                        value
                    )));
                }
                value
            }
            None => defaults.gateway.temperature,
        };

        let max_tokens = match lookup("REMEDIATION_MAX_TOKENS") {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(parse_positive::<u32>("REMEDIATION_MAX_TOKENS", &raw)?),
            None => defaults.gateway.max_tokens,
        };

        let gateway = GatewayConfig {
            api_key: lookup("GROQ_API_KEY").filter(|k| !k.trim().is_empty()),
            base_url,
            model: lookup("REMEDIATION_MODEL").unwrap_or(defaults.gateway.model),
            temperature,
            max_tokens,
        };

        let planner = PlannerConfig {
            max_concurrency: match lookup("REMEDIATION_MAX_CONCURRENCY") {
                Some(raw) => parse_positive("REMEDIATION_MAX_CONCURRENCY", &raw)?,
                None => defaults.planner.max_concurrency,
            },
            request_timeout: match lookup("REMEDIATION_TIMEOUT_SECS") {
                Some(raw) => Duration::from_secs(parse_positive("REMEDIATION_TIMEOUT_SECS", &raw)?),
                None => defaults.planner.request_timeout,
            },
        };

        let paths = PathsConfig {
            previous_schema: lookup("PREVIOUS_SCHEMA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.paths.previous_schema),
            current_schema: lookup("CURRENT_SCHEMA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.paths.current_schema),
            script: lookup("TRANSFORM_SCRIPT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.paths.script),
        };

        Ok(Self {
            gateway,
            planner,
            paths,
        })
    }

    /// Validate a backend base URL (https://...)
    fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
        match url::Url::parse(raw) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                Ok(parsed.as_str().trim_end_matches('/').to_string())
            }
            Ok(parsed) => Err(ConfigError::InvalidValue(format!(
                "GROQ_BASE_URL must use http or https, got {}",
                parsed.scheme()
            ))),
            Err(_) => Err(ConfigError::InvalidValue(
                "Invalid GROQ_BASE_URL format (expected https://...)".to_string(),
            )),
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{} has an unparsable value: {}", key, raw)))
}

fn parse_positive<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let value: T = parse_value(key, raw)?;
    if value <= T::default() {
        return Err(ConfigError::InvalidValue(format!("{} must be greater than zero", key)));
    }
    Ok(value)
}
