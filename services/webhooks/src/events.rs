use serde_json::Value as JsonValue;
use shared::utils::call_id_from_cid;
use thiserror::Error;

pub const EVENT_TEST: &str = "test";
pub const EVENT_CALL_SESSION_STARTED: &str = "call.session_started";
pub const EVENT_PARTICIPANT_LEFT: &str = "call.session_participant_left";
pub const EVENT_CALL_SESSION_ENDED: &str = "call.session_ended";
pub const EVENT_TRANSCRIPTION_READY: &str = "call.transcription_ready";
pub const EVENT_RECORDING_READY: &str = "call.recording_ready";
pub const EVENT_MESSAGE_NEW: &str = "message.new";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("Invalid JSON payload")]
    InvalidJson,
    #[error("Missing meeting ID")]
    MissingMeetingId,
    #[error("Malformed {0} payload")]
    Malformed(&'static str),
    #[error("Missing required fields")]
    MissingChatFields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessageEvent {
    pub user_id: String,
    pub channel_id: String,
    pub text: String,
}

/// A verified webhook delivery, narrowed to the fields each event kind needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    Test,
    CallStarted {
        meeting_id: String,
        call_ref: Option<String>,
    },
    ParticipantLeft {
        call_id: String,
    },
    CallEnded {
        meeting_id: String,
    },
    TranscriptReady {
        meeting_id: String,
        transcript_url: String,
    },
    RecordingReady {
        meeting_id: String,
        recording_url: String,
    },
    ChatMessage(ChatMessageEvent),
    Unknown {
        event_type: Option<String>,
    },
}

impl WebhookEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Test => EVENT_TEST,
            Self::CallStarted { .. } => EVENT_CALL_SESSION_STARTED,
            Self::ParticipantLeft { .. } => EVENT_PARTICIPANT_LEFT,
            Self::CallEnded { .. } => EVENT_CALL_SESSION_ENDED,
            Self::TranscriptReady { .. } => EVENT_TRANSCRIPTION_READY,
            Self::RecordingReady { .. } => EVENT_RECORDING_READY,
            Self::ChatMessage(_) => EVENT_MESSAGE_NEW,
            Self::Unknown { .. } => "unknown",
        }
    }
}

fn text_at<'a>(payload: &'a JsonValue, pointer: &str) -> Option<&'a str> {
    payload
        .pointer(pointer)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// `call.custom.meetingId`, falling back to the id half of `call_cid`.
fn meeting_id(payload: &JsonValue) -> Result<String, ClassifyError> {
    text_at(payload, "/call/custom/meetingId")
        .or_else(|| text_at(payload, "/call_cid").and_then(call_id_from_cid))
        .map(str::to_string)
        .ok_or(ClassifyError::MissingMeetingId)
}

pub fn classify(body: &[u8]) -> Result<WebhookEvent, ClassifyError> {
    let payload: JsonValue = serde_json::from_slice(body).map_err(|_| ClassifyError::InvalidJson)?;

    let event_type = payload.get("type").and_then(JsonValue::as_str);

    let event = match event_type {
        Some(EVENT_TEST) => WebhookEvent::Test,
        Some(EVENT_CALL_SESSION_STARTED) => WebhookEvent::CallStarted {
            meeting_id: meeting_id(&payload)?,
            call_ref: text_at(&payload, "/call/cid")
                .or_else(|| text_at(&payload, "/call_cid"))
                .map(str::to_string),
        },
        Some(EVENT_PARTICIPANT_LEFT) => WebhookEvent::ParticipantLeft {
            call_id: text_at(&payload, "/call_cid")
                .and_then(call_id_from_cid)
                .map(str::to_string)
                .ok_or(ClassifyError::MissingMeetingId)?,
        },
        Some(EVENT_CALL_SESSION_ENDED) => WebhookEvent::CallEnded {
            meeting_id: meeting_id(&payload)?,
        },
        Some(EVENT_TRANSCRIPTION_READY) => {
            let meeting_id = meeting_id(&payload)?;
            let transcript_url = text_at(&payload, "/call_transcription/url")
                .ok_or(ClassifyError::Malformed(EVENT_TRANSCRIPTION_READY))?;
            WebhookEvent::TranscriptReady {
                meeting_id,
                transcript_url: transcript_url.to_string(),
            }
        }
        Some(EVENT_RECORDING_READY) => {
            let meeting_id = meeting_id(&payload)?;
            let recording_url = text_at(&payload, "/call_recording/url")
                .ok_or(ClassifyError::Malformed(EVENT_RECORDING_READY))?;
            WebhookEvent::RecordingReady {
                meeting_id,
                recording_url: recording_url.to_string(),
            }
        }
        Some(EVENT_MESSAGE_NEW) => {
            let fields = (
                text_at(&payload, "/user/id"),
                text_at(&payload, "/channel_id"),
                text_at(&payload, "/message/text"),
            );
            match fields {
                (Some(user_id), Some(channel_id), Some(text)) => {
                    WebhookEvent::ChatMessage(ChatMessageEvent {
                        user_id: user_id.to_string(),
                        channel_id: channel_id.to_string(),
                        text: text.to_string(),
                    })
                }
                _ => return Err(ClassifyError::MissingChatFields),
            }
        }
        other => WebhookEvent::Unknown {
            event_type: other.map(str::to_string),
        },
    };

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify_json(value: JsonValue) -> Result<WebhookEvent, ClassifyError> {
        classify(value.to_string().as_bytes())
    }

    #[test]
    fn test_invalid_json() {
        assert_eq!(classify(b"not json"), Err(ClassifyError::InvalidJson));
    }

    #[test]
    fn test_meeting_id_prefers_custom_field() {
        let event = classify_json(json!({
            "type": "call.session_ended",
            "call": {"custom": {"meetingId": "m-custom"}},
            "call_cid": "default:m-cid"
        }))
        .unwrap();
        assert_eq!(
            event,
            WebhookEvent::CallEnded {
                meeting_id: "m-custom".to_string()
            }
        );
    }

    #[test]
    fn test_meeting_id_falls_back_to_call_cid() {
        let event = classify_json(json!({
            "type": "call.session_ended",
            "call_cid": "default:m-cid"
        }))
        .unwrap();
        assert_eq!(
            event,
            WebhookEvent::CallEnded {
                meeting_id: "m-cid".to_string()
            }
        );
    }

    #[test]
    fn test_missing_meeting_id() {
        let result = classify_json(json!({"type": "call.session_started", "call": {}}));
        assert_eq!(result, Err(ClassifyError::MissingMeetingId));
    }

    #[test]
    fn test_call_started_carries_call_ref() {
        let event = classify_json(json!({
            "type": "call.session_started",
            "call": {"cid": "default:m1", "custom": {"meetingId": "m1"}}
        }))
        .unwrap();
        assert_eq!(
            event,
            WebhookEvent::CallStarted {
                meeting_id: "m1".to_string(),
                call_ref: Some("default:m1".to_string()),
            }
        );
    }

    #[test]
    fn test_transcript_ready_requires_url() {
        let result = classify_json(json!({
            "type": "call.transcription_ready",
            "call_cid": "default:m1",
            "call_transcription": {}
        }));
        assert_eq!(
            result,
            Err(ClassifyError::Malformed(EVENT_TRANSCRIPTION_READY))
        );
    }

    #[test]
    fn test_participant_left_uses_bare_call_id() {
        let event = classify_json(json!({
            "type": "call.session_participant_left",
            "call_cid": "default:call-9"
        }))
        .unwrap();
        assert_eq!(
            event,
            WebhookEvent::ParticipantLeft {
                call_id: "call-9".to_string()
            }
        );
    }

    #[test]
    fn test_message_new_requires_all_fields() {
        let result = classify_json(json!({
            "type": "message.new",
            "channel_id": "m1",
            "message": {"text": "hello"}
        }));
        assert_eq!(result, Err(ClassifyError::MissingChatFields));
    }

    #[test]
    fn test_unrecognized_and_missing_types() {
        assert_eq!(
            classify_json(json!({"type": "call.live_started"})).unwrap(),
            WebhookEvent::Unknown {
                event_type: Some("call.live_started".to_string())
            }
        );
        assert_eq!(
            classify_json(json!({"call_cid": "default:m1"})).unwrap(),
            WebhookEvent::Unknown { event_type: None }
        );
    }
}
