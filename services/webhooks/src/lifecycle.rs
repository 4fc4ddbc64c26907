//! Meeting lifecycle state machine driven by call platform events.
//!
//! Each handler re-reads the meeting and writes through
//! [`MeetingStore::update_if`], so concurrent or duplicated deliveries of the
//! same event can never move a meeting backwards. Side effects on external
//! systems run after the status write and their failures are logged and dropped.

use chrono::Utc;
use shared::db::error::DatabaseError;
use shared::models::{Meeting, MeetingStatus, MeetingUpdate, ProcessingRequest};
use shared::utils::call_id_from_cid;
use shared::{AgentStore, DispatchOutcome, JobDispatcher, MeetingStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::platform::{CallPlatform, CALL_TYPE};
use crate::voice_agent::{VoiceAgentConnector, VoiceAgentRequest, VoiceSettings};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Meeting not found")]
    MeetingNotFound(String),
    #[error("Agent not found")]
    AgentNotFound(String),
    #[error("Meeting cannot be cancelled while {1}")]
    NotCancellable(String, MeetingStatus),
    #[error("Failed to dispatch transcript processing")]
    Dispatch(#[source] anyhow::Error),
    #[error(transparent)]
    Store(#[from] DatabaseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// The meeting moved to this status.
    Transitioned(MeetingStatus),
    /// Fields were written without a status change.
    Recorded,
    /// Nothing applied to the meeting in its current status.
    NoChange,
    /// Transcript processing was handed to the job queue.
    Dispatched(DispatchOutcome),
}

/// Result of a best-effort call to an external system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    Ok,
    Failed(String),
}

impl SideEffect {
    pub fn capture(what: &str, subject: &str, result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(e) => {
                warn!("{} failed for {}: {:#}", what, subject, e);
                Self::Failed(format!("{:#}", e))
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

struct VoiceAgent {
    connector: Arc<dyn VoiceAgentConnector>,
    settings: VoiceSettings,
}

pub struct MeetingLifecycle {
    meetings: Arc<dyn MeetingStore>,
    agents: Arc<dyn AgentStore>,
    dispatcher: Arc<dyn JobDispatcher>,
    calls: Arc<dyn CallPlatform>,
    voice_agent: Option<VoiceAgent>,
}

impl MeetingLifecycle {
    pub fn new(
        meetings: Arc<dyn MeetingStore>,
        agents: Arc<dyn AgentStore>,
        dispatcher: Arc<dyn JobDispatcher>,
        calls: Arc<dyn CallPlatform>,
    ) -> Self {
        Self {
            meetings,
            agents,
            dispatcher,
            calls,
            voice_agent: None,
        }
    }

    /// Enables connecting the meeting's agent to the call when it starts.
    pub fn with_voice_agent(
        mut self,
        connector: Arc<dyn VoiceAgentConnector>,
        settings: VoiceSettings,
    ) -> Self {
        self.voice_agent = Some(VoiceAgent {
            connector,
            settings,
        });
        self
    }

    async fn load(&self, meeting_id: &str) -> Result<Meeting, LifecycleError> {
        self.meetings
            .find_by_id(meeting_id)
            .await?
            .ok_or_else(|| LifecycleError::MeetingNotFound(meeting_id.to_string()))
    }

    pub async fn call_started(
        &self,
        meeting_id: &str,
        call_ref: Option<&str>,
    ) -> Result<LifecycleOutcome, LifecycleError> {
        let meeting = self.load(meeting_id).await?;

        if meeting.status.is_terminal() || meeting.status == MeetingStatus::Processing {
            info!(
                "Meeting {} is {}, ignoring call start",
                meeting_id, meeting.status
            );
            return Ok(LifecycleOutcome::NoChange);
        }

        let agent = self
            .agents
            .find_by_id(&meeting.agent_id)
            .await?
            .ok_or_else(|| LifecycleError::AgentNotFound(meeting.agent_id.clone()))?;

        if meeting.status == MeetingStatus::Upcoming {
            let mut activate = MeetingUpdate::status(MeetingStatus::Active)
                .with_started_at(Utc::now());
            if let Some(call_ref) = call_ref {
                activate = activate.with_call_ref(call_ref);
            }

            if self
                .meetings
                .update_if(meeting_id, &[MeetingStatus::Upcoming], activate)
                .await?
                .is_some()
            {
                info!("Meeting {} is now active", meeting_id);
                self.connect_voice_agent(meeting_id, call_ref, &agent).await;
                return Ok(LifecycleOutcome::Transitioned(MeetingStatus::Active));
            }

            debug!("Meeting {} was activated concurrently", meeting_id);
        }

        let current = self.load(meeting_id).await?;
        if current.status != MeetingStatus::Active {
            return Ok(LifecycleOutcome::NoChange);
        }

        let outcome = self.fill_call_ref(&current, call_ref).await?;
        // Redeliveries retry the connection; the agent may have dropped or never joined.
        let known_ref = call_ref.or(current.external_call_ref.as_deref());
        self.connect_voice_agent(meeting_id, known_ref, &agent).await;
        Ok(outcome)
    }

    /// Records the call reference on an active meeting that has none yet.
    async fn fill_call_ref(
        &self,
        current: &Meeting,
        call_ref: Option<&str>,
    ) -> Result<LifecycleOutcome, LifecycleError> {
        let call_ref = match call_ref {
            Some(call_ref) if current.external_call_ref.is_none() => call_ref,
            _ => return Ok(LifecycleOutcome::NoChange),
        };

        let updated = self
            .meetings
            .update_if(
                &current.id,
                &[MeetingStatus::Active],
                MeetingUpdate::default().with_call_ref(call_ref),
            )
            .await?;

        Ok(match updated {
            Some(_) => LifecycleOutcome::Recorded,
            None => LifecycleOutcome::NoChange,
        })
    }

    async fn connect_voice_agent(
        &self,
        meeting_id: &str,
        call_ref: Option<&str>,
        agent: &shared::models::Agent,
    ) -> Option<SideEffect> {
        let voice_agent = self.voice_agent.as_ref()?;

        let call_id = call_ref
            .map(|r| call_id_from_cid(r).unwrap_or(r))
            .unwrap_or(meeting_id);
        let request =
            VoiceAgentRequest::for_agent(CALL_TYPE, call_id, agent, &voice_agent.settings);

        let effect = SideEffect::capture(
            "Voice agent connection",
            meeting_id,
            voice_agent.connector.connect(&request).await,
        );
        if effect.is_ok() {
            info!("Agent {} joined the call for meeting {}", agent.id, meeting_id);
        }
        Some(effect)
    }

    /// Ends the call once a participant leaves. Touches no meeting state.
    pub async fn participant_left(&self, call_id: &str) -> SideEffect {
        SideEffect::capture(
            "Ending call",
            call_id,
            self.calls.end_call(CALL_TYPE, call_id).await,
        )
    }

    pub async fn call_ended(&self, meeting_id: &str) -> Result<LifecycleOutcome, LifecycleError> {
        let meeting = self.load(meeting_id).await?;

        if meeting.status != MeetingStatus::Active {
            info!(
                "Meeting {} is {}, ignoring call end",
                meeting_id, meeting.status
            );
            return Ok(LifecycleOutcome::NoChange);
        }

        let updated = self
            .meetings
            .update_if(
                meeting_id,
                &[MeetingStatus::Active],
                MeetingUpdate::status(MeetingStatus::Processing).with_ended_at(Utc::now()),
            )
            .await?;

        Ok(match updated {
            Some(_) => {
                info!("Meeting {} ended, awaiting transcript", meeting_id);
                LifecycleOutcome::Transitioned(MeetingStatus::Processing)
            }
            None => LifecycleOutcome::NoChange,
        })
    }

    pub async fn transcript_ready(
        &self,
        meeting_id: &str,
        transcript_url: &str,
    ) -> Result<LifecycleOutcome, LifecycleError> {
        let meeting = self.load(meeting_id).await?;
        if meeting.status == MeetingStatus::Cancelled {
            info!("Meeting {} is cancelled, ignoring transcript", meeting_id);
            return Ok(LifecycleOutcome::NoChange);
        }

        let Some(updated) = self
            .meetings
            .update_if(
                meeting_id,
                &MeetingStatus::NOT_CANCELLED,
                MeetingUpdate::default().with_transcript_url(transcript_url),
            )
            .await?
        else {
            return Ok(LifecycleOutcome::NoChange);
        };

        let mut status = updated.status;
        if matches!(status, MeetingStatus::Upcoming | MeetingStatus::Active) {
            let moved = self
                .meetings
                .update_if(
                    meeting_id,
                    &[MeetingStatus::Upcoming, MeetingStatus::Active],
                    MeetingUpdate::status(MeetingStatus::Processing),
                )
                .await?;
            status = match moved {
                Some(meeting) => meeting.status,
                None => self.load(meeting_id).await?.status,
            };
        }

        match status {
            MeetingStatus::Completed => {
                info!(
                    "Meeting {} already completed, not dispatching processing again",
                    meeting_id
                );
                return Ok(LifecycleOutcome::Recorded);
            }
            MeetingStatus::Cancelled => return Ok(LifecycleOutcome::Recorded),
            _ => {}
        }

        let request = ProcessingRequest::new(meeting_id, transcript_url);
        let outcome = self
            .dispatcher
            .dispatch(&request)
            .await
            .map_err(LifecycleError::Dispatch)?;

        match &outcome {
            DispatchOutcome::Enqueued(job_id) => {
                info!("Meeting {} queued for processing as job {}", meeting_id, job_id)
            }
            DispatchOutcome::Duplicate => {
                info!("Meeting {} transcript already queued", meeting_id)
            }
        }

        Ok(LifecycleOutcome::Dispatched(outcome))
    }

    pub async fn recording_ready(
        &self,
        meeting_id: &str,
        recording_url: &str,
    ) -> Result<LifecycleOutcome, LifecycleError> {
        let meeting = self.load(meeting_id).await?;
        if meeting.status == MeetingStatus::Cancelled {
            info!("Meeting {} is cancelled, ignoring recording", meeting_id);
            return Ok(LifecycleOutcome::NoChange);
        }

        let updated = self
            .meetings
            .update_if(
                meeting_id,
                &MeetingStatus::NOT_CANCELLED,
                MeetingUpdate::default().with_recording_url(recording_url),
            )
            .await?;

        Ok(match updated {
            Some(_) => LifecycleOutcome::Recorded,
            None => LifecycleOutcome::NoChange,
        })
    }

    /// User-initiated cancellation of a meeting that has not finished its call.
    pub async fn cancel(&self, meeting_id: &str) -> Result<LifecycleOutcome, LifecycleError> {
        let meeting = self.load(meeting_id).await?;
        if meeting.status == MeetingStatus::Cancelled {
            return Ok(LifecycleOutcome::NoChange);
        }

        let updated = self
            .meetings
            .update_if(
                meeting_id,
                &[MeetingStatus::Upcoming, MeetingStatus::Active],
                MeetingUpdate::status(MeetingStatus::Cancelled),
            )
            .await?;

        match updated {
            Some(_) => {
                info!("Meeting {} cancelled", meeting_id);
                Ok(LifecycleOutcome::Transitioned(MeetingStatus::Cancelled))
            }
            None => {
                let current = self.load(meeting_id).await?;
                match current.status {
                    MeetingStatus::Cancelled => Ok(LifecycleOutcome::NoChange),
                    status => Err(LifecycleError::NotCancellable(meeting_id.to_string(), status)),
                }
            }
        }
    }
}
