use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parley_webhooks::platform::{CallPlatform, ChatPlatform};
use parley_webhooks::voice_agent::{VoiceAgentConnector, VoiceAgentRequest};
use shared::stream::{StreamMessage, StreamUser};
use shared::{ChatMessage, LanguageModel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingCallPlatform {
    pub ended: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl CallPlatform for RecordingCallPlatform {
    async fn end_call(&self, call_type: &str, call_id: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("call platform unavailable"));
        }
        self.ended
            .lock()
            .unwrap()
            .push((call_type.to_string(), call_id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingVoiceAgent {
    pub requests: Mutex<Vec<VoiceAgentRequest>>,
    pub fail: AtomicBool,
}

impl RecordingVoiceAgent {
    pub fn connections(&self) -> Vec<VoiceAgentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoiceAgentConnector for RecordingVoiceAgent {
    async fn connect(&self, request: &VoiceAgentRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("realtime bridge unavailable"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub channel_type: String,
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
}

#[derive(Default)]
pub struct RecordingChatPlatform {
    pub history: Mutex<Vec<StreamMessage>>,
    pub upserted: Mutex<Vec<(String, String, Option<String>)>>,
    pub sent: Mutex<Vec<SentMessage>>,
}

impl RecordingChatPlatform {
    pub fn push_history(&self, user_id: &str, text: &str) {
        self.history.lock().unwrap().push(StreamMessage {
            text: Some(text.to_string()),
            user: Some(StreamUser {
                id: user_id.to_string(),
                name: None,
            }),
        });
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for RecordingChatPlatform {
    async fn recent_messages(
        &self,
        _channel_type: &str,
        _channel_id: &str,
        limit: usize,
    ) -> Result<Vec<StreamMessage>> {
        let history = self.history.lock().unwrap();
        let skip = history.len().saturating_sub(limit);
        Ok(history.iter().skip(skip).cloned().collect())
    }

    async fn upsert_user(&self, id: &str, name: &str, image: Option<&str>) -> Result<()> {
        self.upserted.lock().unwrap().push((
            id.to_string(),
            name.to_string(),
            image.map(str::to_string),
        ));
        Ok(())
    }

    async fn send_message(
        &self,
        channel_type: &str,
        channel_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(SentMessage {
            channel_type: channel_type.to_string(),
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Language model that returns a fixed reply, or fails when the reply is `None`.
pub struct ScriptedModel {
    reply: Mutex<Option<String>>,
    pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Mutex::new(Some(reply.to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn fail(&self) {
        *self.reply.lock().unwrap() = None;
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        self.reply
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("model unavailable"))
    }
}
