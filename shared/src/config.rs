use anyhow::{anyhow, Context, Result};
use std::env;

pub const DEFAULT_STREAM_VIDEO_BASE_URL: &str = "https://video.stream-io-api.com";
pub const DEFAULT_STREAM_CHAT_BASE_URL: &str = "https://chat.stream-io-api.com";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow!("{} must be valid: {}", key, e)),
        None => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

        Ok(Self {
            database_url,
            max_connections: parse_env("DB_MAX_CONNECTIONS", 10)?,
            acquire_timeout_seconds: parse_env("DB_ACQUIRE_TIMEOUT_SECONDS", 3)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub api_key: String,
    pub api_secret: String,
    pub video_base_url: String,
    pub chat_base_url: String,
}

impl StreamConfig {
    pub fn from_env() -> Result<Self> {
        // Prefer the server-side key; fall back to the public one
        let api_key = optional_env("STREAM_VIDEO_API_KEY")
            .or_else(|| optional_env("NEXT_PUBLIC_STREAM_VIDEO_API_KEY"))
            .ok_or_else(|| {
                anyhow!("STREAM_VIDEO_API_KEY (or NEXT_PUBLIC_STREAM_VIDEO_API_KEY) is not set")
            })?;
        let api_secret =
            optional_env("STREAM_VIDEO_SECRET_KEY").context("STREAM_VIDEO_SECRET_KEY is not set")?;

        Ok(Self {
            api_key,
            api_secret,
            video_base_url: env_or("STREAM_VIDEO_BASE_URL", DEFAULT_STREAM_VIDEO_BASE_URL),
            chat_base_url: env_or("STREAM_CHAT_BASE_URL", DEFAULT_STREAM_CHAT_BASE_URL),
        })
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub realtime_model: String,
    pub realtime_voice: String,
    pub realtime_greeting: String,
}

impl OpenAiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: optional_env("OPENAI_API_KEY"),
            base_url: env_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            model: env_or("OPENAI_MODEL", "gpt-4o"),
            realtime_model: env_or("OPENAI_REALTIME_MODEL", "gpt-4o-realtime-preview"),
            realtime_voice: env_or("OPENAI_REALTIME_VOICE", "verse"),
            realtime_greeting: env_or(
                "OPENAI_REALTIME_GREETING",
                "Hi everyone, I'm your AI meeting assistant. I'm here to help with summaries and questions.",
            ),
        }
    }
}
