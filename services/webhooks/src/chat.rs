use anyhow::{anyhow, Result};
use shared::models::{Agent, Meeting, MeetingStatus};
use shared::stream::StreamMessage;
use shared::{AgentStore, ChatMessage, LanguageModel, MeetingStore};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::events::ChatMessageEvent;
use crate::lifecycle::{LifecycleError, SideEffect};
use crate::platform::{ChatPlatform, CHAT_CHANNEL_TYPE};

const HISTORY_LIMIT: usize = 5;
const AVATAR_BASE_URL: &str = "https://api.dicebear.com/9.x/bottts-neutral/svg";

pub fn avatar_uri(seed: &str) -> Option<String> {
    Url::parse_with_params(AVATAR_BASE_URL, &[("seed", seed)])
        .ok()
        .map(String::from)
}

pub fn follow_up_instructions(summary: &str, agent_prompt: &str) -> String {
    format!(
        "You are an AI assistant helping the user revisit a recently completed meeting.
Below is a summary of the meeting, generated from the transcript:

{summary}

The following are your original instructions from the live meeting assistant. Please continue to follow these behavioral guidelines as you assist the user:

{agent_prompt}

The user may ask questions about the meeting, request clarifications, or ask for follow-up actions.
Always base your responses on the meeting summary above.

You also have access to the recent conversation history between you and the user. Use the context of previous messages to provide relevant, coherent, and helpful responses. If the user's question refers to something discussed earlier, make sure to take that into account and maintain continuity in the conversation.

If the summary does not contain enough information to answer a question, politely let the user know.

Be concise, helpful, and focus on providing accurate information from the meeting and the ongoing conversation."
    )
}

/// Maps channel history to model turns. Messages from the agent become
/// assistant turns and blank messages are dropped.
pub fn history_turns(messages: &[StreamMessage], agent_id: &str) -> Vec<ChatMessage> {
    messages
        .iter()
        .filter_map(|message| {
            let text = message.text.as_deref().filter(|t| !t.trim().is_empty())?;
            let from_agent = message
                .user
                .as_ref()
                .is_some_and(|user| user.id == agent_id);
            Some(if from_agent {
                ChatMessage::assistant(text)
            } else {
                ChatMessage::user(text)
            })
        })
        .collect()
}

/// Answers chat questions about a completed meeting as the meeting's agent.
pub struct FollowUpResponder {
    meetings: Arc<dyn MeetingStore>,
    agents: Arc<dyn AgentStore>,
    chat: Arc<dyn ChatPlatform>,
    model: Option<Arc<dyn LanguageModel>>,
}

impl FollowUpResponder {
    pub fn new(
        meetings: Arc<dyn MeetingStore>,
        agents: Arc<dyn AgentStore>,
        chat: Arc<dyn ChatPlatform>,
        model: Option<Arc<dyn LanguageModel>>,
    ) -> Self {
        Self {
            meetings,
            agents,
            chat,
            model,
        }
    }

    /// Returns `None` when the message was written by the agent itself.
    pub async fn respond(
        &self,
        event: &ChatMessageEvent,
    ) -> Result<Option<SideEffect>, LifecycleError> {
        let meeting = self
            .meetings
            .find_by_id(&event.channel_id)
            .await?
            .filter(|m| m.status == MeetingStatus::Completed)
            .ok_or_else(|| LifecycleError::MeetingNotFound(event.channel_id.clone()))?;

        let agent = self
            .agents
            .find_by_id(&meeting.agent_id)
            .await?
            .ok_or_else(|| LifecycleError::AgentNotFound(meeting.agent_id.clone()))?;

        if event.user_id == agent.id {
            debug!("Ignoring message from agent {} in {}", agent.id, meeting.id);
            return Ok(None);
        }

        let effect = SideEffect::capture(
            "Follow-up reply",
            &meeting.id,
            self.reply(&meeting, &agent, &event.text).await,
        );
        Ok(Some(effect))
    }

    async fn reply(&self, meeting: &Meeting, agent: &Agent, text: &str) -> Result<()> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow!("no language model configured"))?;

        let history = match self
            .chat
            .recent_messages(CHAT_CHANNEL_TYPE, &meeting.id, HISTORY_LIMIT)
            .await
        {
            Ok(messages) => history_turns(&messages, &agent.id),
            Err(e) => {
                warn!("Could not load chat history for {}: {:#}", meeting.id, e);
                Vec::new()
            }
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(follow_up_instructions(
            meeting.summary.as_deref().unwrap_or_default(),
            &agent.prompt,
        )));
        messages.extend(history);
        messages.push(ChatMessage::user(text));

        let answer = model.complete(&messages).await?;
        if answer.trim().is_empty() {
            return Err(anyhow!("language model returned an empty reply"));
        }

        let avatar = avatar_uri(&agent.name);
        self.chat
            .upsert_user(&agent.id, &agent.name, avatar.as_deref())
            .await?;
        self.chat
            .send_message(CHAT_CHANNEL_TYPE, &meeting.id, &agent.id, &answer)
            .await?;

        info!("Agent {} replied in meeting chat {}", agent.id, meeting.id);
        Ok(())
    }
}
