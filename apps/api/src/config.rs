use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub attachment_timeout: Duration,
    pub generation_timeout: Duration,
    /// Sessions untouched for this long are evicted.
    pub session_idle_ttl: Duration,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            llm_max_tokens: parse_env("LLM_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
            attachment_timeout: Duration::from_secs(parse_env("ATTACHMENT_TIMEOUT_SECS", 30)?),
            generation_timeout: Duration::from_secs(parse_env("GENERATION_TIMEOUT_SECS", 180)?),
            session_idle_ttl: Duration::from_secs(parse_env("SESSION_IDLE_TTL_SECS", 3600)?),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} must be a valid {}", std::any::type_name::<T>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_accepts_padded_numbers() {
        let port: u16 = parse_value("PORT", " 9000 ").unwrap();
        assert_eq!(port, 9000);
    }

    #[test]
    fn test_parse_value_rejects_garbage() {
        let err = parse_value::<u16>("PORT", "eighty").unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_parse_value_rejects_out_of_range_port() {
        assert!(parse_value::<u16>("PORT", "70000").is_err());
    }
}
