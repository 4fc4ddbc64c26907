use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Lifecycle status of a meeting.
///
/// Statuses only move forward through `upcoming -> active -> processing -> completed`.
/// `cancelled` can preempt `upcoming` or `active`. `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "meeting_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Upcoming,
    Active,
    Processing,
    Completed,
    Cancelled,
}

impl MeetingStatus {
    pub const ALL: [MeetingStatus; 5] = [
        MeetingStatus::Upcoming,
        MeetingStatus::Active,
        MeetingStatus::Processing,
        MeetingStatus::Completed,
        MeetingStatus::Cancelled,
    ];

    /// Every status a lifecycle event may still write to.
    pub const NOT_CANCELLED: [MeetingStatus; 4] = [
        MeetingStatus::Upcoming,
        MeetingStatus::Active,
        MeetingStatus::Processing,
        MeetingStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    fn rank(&self) -> Option<u8> {
        match self {
            Self::Upcoming => Some(0),
            Self::Active => Some(1),
            Self::Processing => Some(2),
            Self::Completed => Some(3),
            Self::Cancelled => None,
        }
    }

    /// Whether a write moving `self` to `next` respects the lifecycle ordering.
    ///
    /// `completed -> completed` is allowed so the pipeline can overwrite its own summary.
    pub fn can_advance_to(&self, next: MeetingStatus) -> bool {
        match (self, next) {
            (Self::Cancelled, _) => false,
            (Self::Upcoming | Self::Active, Self::Cancelled) => true,
            (_, Self::Cancelled) => false,
            (current, next) => match (current.rank(), next.rank()) {
                (Some(from), Some(to)) => to >= from,
                _ => false,
            },
        }
    }
}

impl fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub agent_id: String,
    pub status: MeetingStatus,
    pub external_call_ref: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub transcript_url: Option<String>,
    pub recording_url: Option<String>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub agent_id: String,
}

impl NewMeeting {
    pub fn new(
        name: impl Into<String>,
        user_id: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            id: crate::utils::generate_ulid(),
            name: name.into(),
            user_id: user_id.into(),
            agent_id: agent_id.into(),
        }
    }
}

/// A conditional write against one meeting row.
///
/// `started_at`, `ended_at` and `external_call_ref` are write-once: they are only
/// filled when currently empty. The remaining fields overwrite when present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeetingUpdate {
    pub status: Option<MeetingStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub external_call_ref: Option<String>,
    pub transcript_url: Option<String>,
    pub recording_url: Option<String>,
    pub summary: Option<String>,
}

impl MeetingUpdate {
    pub fn status(status: MeetingStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn with_ended_at(mut self, at: DateTime<Utc>) -> Self {
        self.ended_at = Some(at);
        self
    }

    pub fn with_call_ref(mut self, call_ref: impl Into<String>) -> Self {
        self.external_call_ref = Some(call_ref.into());
        self
    }

    pub fn with_transcript_url(mut self, url: impl Into<String>) -> Self {
        self.transcript_url = Some(url.into());
        self
    }

    pub fn with_recording_url(mut self, url: impl Into<String>) -> Self {
        self.recording_url = Some(url.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Narrows the caller's precondition to the statuses from which this update's
    /// target status is a legal lifecycle edge.
    pub fn permitted_from(&self, allowed: &[MeetingStatus]) -> Vec<MeetingStatus> {
        allowed
            .iter()
            .copied()
            .filter(|current| match self.status {
                Some(next) => current.can_advance_to(next),
                None => true,
            })
            .collect()
    }

    /// Applies the update in memory with the same semantics as the SQL statement
    /// in `MeetingRepository::update_if`.
    pub fn apply(&self, meeting: &mut Meeting, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            meeting.status = status;
        }
        if meeting.started_at.is_none() {
            meeting.started_at = self.started_at;
        }
        if meeting.ended_at.is_none() {
            meeting.ended_at = self.ended_at;
        }
        if meeting.external_call_ref.is_none() {
            meeting.external_call_ref = self.external_call_ref.clone();
        }
        if let Some(url) = &self.transcript_url {
            meeting.transcript_url = Some(url.clone());
        }
        if let Some(url) = &self.recording_url {
            meeting.recording_url = Some(url.clone());
        }
        if let Some(summary) = &self.summary {
            meeting.summary = Some(summary.clone());
        }
        meeting.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Payload handed to the transcript processing job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRequest {
    pub meeting_id: String,
    pub transcript_url: String,
}

impl ProcessingRequest {
    pub fn new(meeting_id: impl Into<String>, transcript_url: impl Into<String>) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            transcript_url: transcript_url.into(),
        }
    }

    /// Duplicate webhook deliveries for the same transcript share this key.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.meeting_id, self.transcript_url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    DeadLetter,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProcessingJob {
    pub id: String,
    pub meeting_id: String,
    pub transcript_url: String,
    pub dedup_key: String,
    pub status: JobStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl ProcessingJob {
    pub fn request(&self) -> ProcessingRequest {
        ProcessingRequest::new(&self.meeting_id, &self.transcript_url)
    }
}
