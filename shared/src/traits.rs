use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::db::error::DatabaseError;
use crate::models::{
    Agent, Meeting, MeetingStatus, MeetingUpdate, NewMeeting, ProcessingRequest, User,
};

/// Persistent meeting records. Every status write is conditional on the current status.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Meeting>, DatabaseError>;

    async fn insert(&self, meeting: NewMeeting) -> Result<Meeting, DatabaseError>;

    /// Applies `update` only when the meeting exists and its current status is one of
    /// `allowed`. Returns the updated row, or `None` when the precondition did not hold.
    async fn update_if(
        &self,
        id: &str,
        allowed: &[MeetingStatus],
        update: MeetingUpdate,
    ) -> Result<Option<Meeting>, DatabaseError>;
}

#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Agent>, DatabaseError>;

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Agent>, DatabaseError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<User>, DatabaseError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Enqueued(String),
    /// A job with the same dedup key already exists.
    Duplicate,
}

/// Hands transcript processing requests to the durable job substrate.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, request: &ProcessingRequest) -> Result<DispatchOutcome>;
}

/// Per-job record of completed step outputs, used to resume a job without
/// re-running steps that already finished.
#[async_trait]
pub trait StepJournal: Send + Sync {
    async fn load_step(&self, job_id: &str, step: &str) -> Result<Option<JsonValue>>;

    async fn record_step(&self, job_id: &str, step: &str, output: &JsonValue) -> Result<()>;
}
