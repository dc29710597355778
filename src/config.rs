//! Process configuration, read once from the environment at start-up.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::storage::SupabaseConfig;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini-2024-07-18";
pub const DEFAULT_EPAYCO_VALIDATION_URL: &str =
    "https://secure.epayco.co/validation/v1/reference";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Settings for the chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Settings for the markup renderer child processes.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub pandoc_bin: String,
    pub pdf_engine: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            pandoc_bin: "pandoc".to_string(),
            pdf_engine: "typst".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub supabase: SupabaseConfig,
    pub openai: OpenAiConfig,
    pub epayco_validation_url: String,
    pub render: RenderConfig,
    pub capability_timeout: Duration,
    pub bind_address: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let openai = OpenAiConfig {
            api_key: required("OPENAI_KEY")?,
            url: optional("OPENAI_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            model: optional("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            temperature: parsed("OPENAI_TEMPERATURE", 0.1)?,
            max_tokens: parsed("OPENAI_MAX_TOKENS", 1200)?,
        };

        let render = RenderConfig {
            pandoc_bin: optional("PANDOC_BIN").unwrap_or_else(|| "pandoc".to_string()),
            pdf_engine: optional("PDF_ENGINE").unwrap_or_else(|| "typst".to_string()),
        };

        let allowed_origins = optional("ALLOWED_ORIGINS")
            .map(|raw| split_origins(&raw))
            .unwrap_or_default();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            supabase: SupabaseConfig::from_env()?,
            openai,
            epayco_validation_url: optional("EPAYCO_VALIDATION_URL")
                .unwrap_or_else(|| DEFAULT_EPAYCO_VALIDATION_URL.to_string()),
            render,
            capability_timeout: Duration::from_secs(parsed("CAPABILITY_TIMEOUT_SECS", 120)?),
            bind_address: optional("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed("PORT", 8080)?,
            allowed_origins,
        })
    }
}

pub(crate) fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

pub(crate) fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
