use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::error::{WebhookError, WebhookResult};
use crate::events::{classify, WebhookEvent};
use crate::lifecycle::LifecycleError;
use crate::signature::{SignatureError, SIGNATURE_HEADER};
use crate::AppState;

fn ok() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "parley-webhooks",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult<Json<JsonValue>> {
    let signature = match headers.get(SIGNATURE_HEADER) {
        Some(value) => Some(value.to_str().map_err(|_| SignatureError::Invalid)?),
        None => None,
    };
    state.verifier.verify(&body, signature)?;

    let event = classify(&body)?;
    debug!("Received webhook event {}", event.kind());

    match event {
        WebhookEvent::Test => {
            return Ok(Json(json!({
                "status": "ok",
                "message": "Test webhook working",
            })))
        }
        WebhookEvent::CallStarted {
            meeting_id,
            call_ref,
        } => {
            state
                .lifecycle
                .call_started(&meeting_id, call_ref.as_deref())
                .await?;
        }
        WebhookEvent::ParticipantLeft { call_id } => {
            state.lifecycle.participant_left(&call_id).await;
        }
        WebhookEvent::CallEnded { meeting_id } => {
            state.lifecycle.call_ended(&meeting_id).await?;
        }
        WebhookEvent::TranscriptReady {
            meeting_id,
            transcript_url,
        } => {
            state
                .lifecycle
                .transcript_ready(&meeting_id, &transcript_url)
                .await?;
        }
        WebhookEvent::RecordingReady {
            meeting_id,
            recording_url,
        } => {
            state
                .lifecycle
                .recording_ready(&meeting_id, &recording_url)
                .await?;
        }
        WebhookEvent::ChatMessage(message) => {
            state.responder.respond(&message).await?;
        }
        WebhookEvent::Unknown { event_type } => {
            warn!(
                "Unknown webhook event type: {}",
                event_type.as_deref().unwrap_or("<missing>")
            );
        }
    }

    Ok(ok())
}

#[derive(Debug, Deserialize)]
pub struct DebugMeetingQuery {
    #[serde(rename = "meetingId")]
    pub meeting_id: Option<String>,
}

pub async fn debug_meeting(
    State(state): State<AppState>,
    Query(query): Query<DebugMeetingQuery>,
) -> WebhookResult<Json<JsonValue>> {
    let meeting_id = query
        .meeting_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| WebhookError::BadRequest("Missing meetingId parameter".to_string()))?;

    let meeting = state
        .meetings
        .find_by_id(&meeting_id)
        .await
        .map_err(LifecycleError::from)?
        .ok_or_else(|| LifecycleError::MeetingNotFound(meeting_id.clone()))?;

    let agent = state
        .agents
        .find_by_id(&meeting.agent_id)
        .await
        .map_err(LifecycleError::from)?;

    Ok(Json(json!({
        "hasCallRef": meeting.external_call_ref.is_some(),
        "hasAgentPrompt": agent.as_ref().is_some_and(|a| !a.prompt.is_empty()),
        "meeting": meeting,
        "agent": agent,
        "status": "ok",
    })))
}

pub async fn cancel_meeting(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> WebhookResult<Json<JsonValue>> {
    state.lifecycle.cancel(&meeting_id).await?;
    info!("Cancel request for meeting {} handled", meeting_id);
    Ok(ok())
}
