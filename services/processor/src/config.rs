use anyhow::Result;
use shared::config::parse_env;
use shared::{DatabaseConfig, OpenAiConfig};

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub port: u16,
    pub database: DatabaseConfig,
    pub openai: OpenAiConfig,
    pub batch_size: i32,
    pub stale_job_minutes: i64,
}

impl ProcessorConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: parse_env("PORT", 3001)?,
            database: DatabaseConfig::from_env()?,
            openai: OpenAiConfig::from_env(),
            batch_size: parse_env("PROCESSOR_BATCH_SIZE", 5)?,
            stale_job_minutes: parse_env("PROCESSOR_STALE_JOB_MINUTES", 15)?,
        })
    }
}
