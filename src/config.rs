//! Runtime configuration
//!
//! Settings come from the process environment (after `.env` is loaded by the
//! binaries); command-line flags can override individual values.

use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Hosted language model provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Google Gemini `generateContent` API
    Gemini,
    /// OpenAI-compatible `/chat/completions` API
    OpenAi,
}

impl LlmProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini-2.5-flash",
            LlmProvider::OpenAi => "gpt-4",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            LlmProvider::OpenAi => "https://api.openai.com/v1",
        }
    }

    fn api_key_var(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "GOOGLE_API_KEY",
            LlmProvider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            "openai" => Ok(LlmProvider::OpenAi),
            other => Err(ChatError::Config(format!(
                "Unknown LLM provider '{}' (expected 'gemini' or 'openai')",
                other
            ))),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::Gemini => write!(f, "gemini"),
            LlmProvider::OpenAi => write!(f, "openai"),
        }
    }
}

#[derive(Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

// The API key never appears in logs.
impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: String,
    pub llm: LlmConfig,
}

/// Values supplied on the command line; `None` keeps the environment value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub provider: Option<LlmProvider>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub bind_addr: Option<String>,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::resolve(&lookup, &ConfigOverrides::default())
    }

    /// Load from the environment, then apply command-line overrides
    pub fn from_env_with(overrides: &ConfigOverrides) -> Result<Self> {
        Self::resolve(&|key: &str| std::env::var(key).ok(), overrides)
    }

    fn resolve(lookup: &dyn Fn(&str) -> Option<String>, overrides: &ConfigOverrides) -> Result<Self> {
        let get = |key: &str| non_blank(lookup, key);

        let database_url = resolve_database_url(lookup, overrides)?;

        let provider = match overrides.provider {
            Some(p) => p,
            None => match get("LLM_PROVIDER") {
                Some(name) => name.parse()?,
                None if get("GOOGLE_API_KEY").is_some() => LlmProvider::Gemini,
                None => LlmProvider::OpenAi,
            },
        };

        let api_key = overrides
            .api_key
            .clone()
            .or_else(|| get(provider.api_key_var()))
            .ok_or_else(|| {
                ChatError::Config(format!("{} is not set", provider.api_key_var()))
            })?;

        let model = overrides
            .model
            .clone()
            .or_else(|| get("LLM_MODEL"))
            .unwrap_or_else(|| provider.default_model().to_string());

        let base_url = get("LLM_BASE_URL")
            .unwrap_or_else(|| provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();

        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<NonZeroU32>()
                .map_err(|_| {
                    ChatError::Config(format!("DB_MAX_CONNECTIONS must be a positive integer, got '{}'", raw))
                })?
                .get(),
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let bind_addr = overrides
            .bind_addr
            .clone()
            .or_else(|| get("BIND_ADDR"))
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        Ok(Self {
            database_url,
            max_connections,
            bind_addr,
            llm: LlmConfig {
                provider,
                api_key,
                model,
                base_url,
            },
        })
    }
}

/// Database URL alone, for commands that never call the model: the
/// `--db-url` override, then `DB_URL`, then `DATABASE_URL`.
pub fn database_url_from_env(overrides: &ConfigOverrides) -> Result<String> {
    resolve_database_url(&|key: &str| std::env::var(key).ok(), overrides)
}

fn resolve_database_url(lookup: &dyn Fn(&str) -> Option<String>, overrides: &ConfigOverrides) -> Result<String> {
    overrides
        .database_url
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| non_blank(lookup, "DB_URL"))
        .or_else(|| non_blank(lookup, "DATABASE_URL"))
        .ok_or_else(|| ChatError::Config("DB_URL is not set".to_string()))
}

fn non_blank(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}
