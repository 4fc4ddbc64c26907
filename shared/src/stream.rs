use anyhow::{anyhow, Context, Result};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tracing::debug;

use crate::config::StreamConfig;

#[derive(Debug, Serialize)]
struct ServerClaims {
    server: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamMessage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub user: Option<StreamUser>,
}

#[derive(Debug, Deserialize)]
struct ChannelState {
    #[serde(default)]
    messages: Vec<StreamMessage>,
}

/// Server-side REST client for the Stream video and chat APIs.
#[derive(Clone)]
pub struct StreamClient {
    client: Client,
    api_key: String,
    api_secret: String,
    video_base_url: String,
    chat_base_url: String,
}

impl StreamClient {
    pub fn new(config: &StreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build Stream HTTP client")?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            video_base_url: config.video_base_url.trim_end_matches('/').to_string(),
            chat_base_url: config.chat_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    fn server_token(&self) -> Result<String> {
        encode(
            &Header::default(),
            &ServerClaims { server: true },
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )
        .context("Failed to sign Stream server token")
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        Ok(builder
            .query(&[("api_key", self.api_key.as_str())])
            .header("Authorization", self.server_token()?)
            .header("stream-auth-type", "jwt"))
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<JsonValue> {
        let response = self
            .authorized(builder)?
            .send()
            .await
            .with_context(|| format!("Failed to send Stream request: {}", what))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Stream API returned HTTP {} for {}: {}", status, what, body));
        }

        let body = response
            .json::<JsonValue>()
            .await
            .with_context(|| format!("Failed to parse Stream response for {}", what))?;
        Ok(body)
    }

    /// Ends a call for every participant.
    pub async fn end_call(&self, call_type: &str, call_id: &str) -> Result<()> {
        debug!("Ending Stream call {}:{}", call_type, call_id);
        let url = format!(
            "{}/video/call/{}/{}/mark_ended",
            self.video_base_url, call_type, call_id
        );
        self.send(self.client.post(url).json(&json!({})), "end call")
            .await?;
        Ok(())
    }

    pub async fn upsert_user(&self, id: &str, name: &str, image: Option<&str>) -> Result<()> {
        let mut user = json!({ "id": id, "name": name, "role": "user" });
        if let Some(image) = image {
            user["image"] = json!(image);
        }
        let url = format!("{}/users", self.chat_base_url);
        self.send(
            self.client.post(url).json(&json!({ "users": { id: user } })),
            "upsert user",
        )
        .await?;
        Ok(())
    }

    pub async fn recent_messages(
        &self,
        channel_type: &str,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<StreamMessage>> {
        let url = format!(
            "{}/channels/{}/{}/query",
            self.chat_base_url, channel_type, channel_id
        );
        let body = self
            .send(
                self.client.post(url).json(&json!({
                    "state": true,
                    "messages": { "limit": limit },
                })),
                "query channel",
            )
            .await?;

        let state: ChannelState =
            serde_json::from_value(body).context("Unexpected Stream channel state shape")?;
        Ok(state.messages)
    }

    pub async fn send_message(
        &self,
        channel_type: &str,
        channel_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/channels/{}/{}/message",
            self.chat_base_url, channel_type, channel_id
        );
        self.send(
            self.client.post(url).json(&json!({
                "message": { "text": text, "user_id": user_id },
            })),
            "send message",
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> StreamConfig {
        StreamConfig {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            video_base_url: "http://localhost:1/".to_string(),
            chat_base_url: "http://localhost:2".to_string(),
        }
    }

    #[test]
    fn test_base_urls_are_normalized() {
        let client = StreamClient::new(&test_config()).unwrap();
        assert_eq!(client.video_base_url, "http://localhost:1");
        assert_eq!(client.chat_base_url, "http://localhost:2");
    }

    #[test]
    fn test_server_token_is_a_jwt() {
        let client = StreamClient::new(&test_config()).unwrap();
        let token = client.server_token().unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_channel_state_tolerates_missing_fields() {
        let state: ChannelState = serde_json::from_value(json!({
            "messages": [{"text": "hello"}, {"user": {"id": "u1"}}]
        }))
        .unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].user.as_ref().unwrap().id, "u1");
    }
}
