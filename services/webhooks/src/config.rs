use anyhow::Result;
use shared::config::{optional_env, parse_env};
use shared::{DatabaseConfig, OpenAiConfig, StreamConfig};

#[derive(Debug, Clone)]
pub struct WebhookServiceConfig {
    pub port: u16,
    pub database: DatabaseConfig,
    pub stream: StreamConfig,
    pub openai: OpenAiConfig,
    pub voice_agent_bridge_url: Option<String>,
}

impl WebhookServiceConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: parse_env("PORT", 3000)?,
            database: DatabaseConfig::from_env()?,
            stream: StreamConfig::from_env()?,
            openai: OpenAiConfig::from_env(),
            voice_agent_bridge_url: optional_env("VOICE_AGENT_BRIDGE_URL"),
        })
    }
}
