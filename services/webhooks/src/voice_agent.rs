use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use shared::models::Agent;
use shared::OpenAiConfig;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_AGENT_INSTRUCTIONS: &str =
    "You are a helpful AI meeting assistant. Speak naturally and professionally in English.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            kind: "server_vad".to_string(),
            threshold: 0.5,
            prefix_padding_ms: 200,
            silence_duration_ms: 700,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub instructions: String,
    pub voice: String,
    pub modalities: Vec<String>,
    pub turn_detection: TurnDetection,
}

/// Realtime model settings shared by every voice session.
#[derive(Debug, Clone)]
pub struct VoiceSettings {
    pub model: String,
    pub voice: String,
    pub greeting: String,
}

impl From<&OpenAiConfig> for VoiceSettings {
    fn from(config: &OpenAiConfig) -> Self {
        Self {
            model: config.realtime_model.clone(),
            voice: config.realtime_voice.clone(),
            greeting: config.realtime_greeting.clone(),
        }
    }
}

/// Everything needed to put an agent into a live call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceAgentRequest {
    pub call_type: String,
    pub call_id: String,
    pub agent_user_id: String,
    pub model: String,
    pub session: SessionConfig,
    pub greeting: String,
}

impl VoiceAgentRequest {
    pub fn for_agent(
        call_type: &str,
        call_id: &str,
        agent: &Agent,
        settings: &VoiceSettings,
    ) -> Self {
        let instructions = if agent.prompt.trim().is_empty() {
            DEFAULT_AGENT_INSTRUCTIONS.to_string()
        } else {
            agent.prompt.clone()
        };

        Self {
            call_type: call_type.to_string(),
            call_id: call_id.to_string(),
            agent_user_id: agent.id.clone(),
            model: settings.model.clone(),
            session: SessionConfig {
                instructions,
                voice: settings.voice.clone(),
                modalities: vec!["text".to_string(), "audio".to_string()],
                turn_detection: TurnDetection::default(),
            },
            greeting: settings.greeting.clone(),
        }
    }
}

/// Connects an AI agent to a live call as a realtime voice participant.
#[async_trait]
pub trait VoiceAgentConnector: Send + Sync {
    async fn connect(&self, request: &VoiceAgentRequest) -> Result<()>;
}

#[derive(Serialize)]
struct BridgeSession<'a> {
    #[serde(flatten)]
    request: &'a VoiceAgentRequest,
    openai_api_key: &'a str,
}

/// Hands voice sessions to the realtime bridge, which joins the call and
/// streams audio to and from the realtime model.
pub struct RealtimeBridge {
    client: Client,
    base_url: String,
    openai_api_key: String,
}

impl RealtimeBridge {
    pub fn new(base_url: &str, openai_api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build realtime bridge HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            openai_api_key: openai_api_key.into(),
        })
    }
}

#[async_trait]
impl VoiceAgentConnector for RealtimeBridge {
    async fn connect(&self, request: &VoiceAgentRequest) -> Result<()> {
        debug!(
            "Requesting voice session for agent {} in call {}:{}",
            request.agent_user_id, request.call_type, request.call_id
        );

        let response = self
            .client
            .post(format!("{}/sessions", self.base_url))
            .json(&BridgeSession {
                request,
                openai_api_key: &self.openai_api_key,
            })
            .send()
            .await
            .context("Failed to reach realtime bridge")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Realtime bridge returned HTTP {}: {}", status, body));
        }

        Ok(())
    }
}
