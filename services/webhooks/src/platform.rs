use anyhow::Result;
use async_trait::async_trait;
use shared::stream::StreamMessage;
use shared::StreamClient;

/// Call type used for every meeting call.
pub const CALL_TYPE: &str = "default";
/// Channel type of the per-meeting follow-up chat.
pub const CHAT_CHANNEL_TYPE: &str = "messaging";

#[async_trait]
pub trait CallPlatform: Send + Sync {
    async fn end_call(&self, call_type: &str, call_id: &str) -> Result<()>;
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn recent_messages(
        &self,
        channel_type: &str,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<StreamMessage>>;

    async fn upsert_user(&self, id: &str, name: &str, image: Option<&str>) -> Result<()>;

    async fn send_message(
        &self,
        channel_type: &str,
        channel_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<()>;
}

#[async_trait]
impl CallPlatform for StreamClient {
    async fn end_call(&self, call_type: &str, call_id: &str) -> Result<()> {
        StreamClient::end_call(self, call_type, call_id).await
    }
}

#[async_trait]
impl ChatPlatform for StreamClient {
    async fn recent_messages(
        &self,
        channel_type: &str,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<StreamMessage>> {
        StreamClient::recent_messages(self, channel_type, channel_id, limit).await
    }

    async fn upsert_user(&self, id: &str, name: &str, image: Option<&str>) -> Result<()> {
        StreamClient::upsert_user(self, id, name, image).await
    }

    async fn send_message(
        &self,
        channel_type: &str,
        channel_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<()> {
        StreamClient::send_message(self, channel_type, channel_id, user_id, text).await
    }
}
