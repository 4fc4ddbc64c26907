use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::events::ClassifyError;
use crate::lifecycle::LifecycleError;
use crate::signature::SignatureError;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("{0}")]
    BadRequest(String),
}

impl WebhookError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Signature(SignatureError::Missing) => StatusCode::BAD_REQUEST,
            Self::Signature(SignatureError::Invalid) => StatusCode::UNAUTHORIZED,
            Self::Classify(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Lifecycle(e) => match e {
                LifecycleError::MeetingNotFound(_) | LifecycleError::AgentNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                LifecycleError::NotCancellable(..) => StatusCode::CONFLICT,
                LifecycleError::Dispatch(_) | LifecycleError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

pub type WebhookResult<T> = Result<T, WebhookError>;

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Lifecycle(LifecycleError::Store(e)) => {
                error!("Meeting store error: {}", e);
                "Internal server error".to_string()
            }
            Self::Lifecycle(LifecycleError::Dispatch(e)) => {
                error!("Job dispatch error: {:#}", e);
                self.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            WebhookError::from(SignatureError::Missing).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::from(SignatureError::Invalid).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::from(LifecycleError::AgentNotFound("a1".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            WebhookError::from(LifecycleError::Dispatch(anyhow::anyhow!("down"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages_match_wire_contract() {
        assert_eq!(
            WebhookError::from(ClassifyError::InvalidJson).to_string(),
            "Invalid JSON payload"
        );
        assert_eq!(
            WebhookError::from(LifecycleError::MeetingNotFound("m1".into())).to_string(),
            "Meeting not found"
        );
    }
}
