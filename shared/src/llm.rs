use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::config::OpenAiConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Prompt in, text out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the text of the first completion choice. An empty string means the
    /// model answered without content.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Chat completions client for the OpenAI HTTP API.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build OpenAI HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &OpenAiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY is not set"))?;
        Self::new(api_key, &config.base_url, &config.model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages,
        });

        debug!(
            "Requesting completion from {} with {} messages",
            self.model,
            messages.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send chat completion request")?;

        let status = response.status();

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(anyhow!(
                "Authentication failed ({}). Check your OpenAI API key.",
                status
            ));
        }

        if status.as_u16() == 429 {
            return Err(anyhow!("Rate limited by OpenAI API. Try again later."));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API returned HTTP {}: {}", status, body));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Chat completion returned no choices"))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_serializes_lowercase_roles() {
        let value = serde_json::to_value(ChatMessage::assistant("hi")).unwrap();
        assert_eq!(value, json!({"role": "assistant", "content": "hi"}));
    }

    #[test]
    fn test_completion_response_without_content() {
        let parsed: CompletionResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": null}}]})).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
