//! In-memory collaborators for tests that do not need Postgres.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::db::error::DatabaseError;
use crate::models::{Agent, Meeting, MeetingStatus, MeetingUpdate, NewMeeting, ProcessingRequest, User};
use crate::traits::{AgentStore, DispatchOutcome, JobDispatcher, MeetingStore, StepJournal, UserStore};
use crate::utils::generate_ulid;

#[derive(Default)]
pub struct InMemoryStore {
    meetings: DashMap<String, Meeting>,
    agents: DashMap<String, Agent>,
    users: DashMap<String, User>,
    writes: AtomicUsize,
    fail_speaker_lookups: AtomicBool,
    fail_meeting_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, name: &str) -> User {
        let user = User {
            id: generate_ulid(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            created_at: Utc::now(),
        };
        self.users.insert(user.id.clone(), user.clone());
        user
    }

    pub fn add_agent(&self, name: &str, prompt: &str) -> Agent {
        let agent = Agent {
            id: generate_ulid(),
            name: name.to_string(),
            user_id: generate_ulid(),
            prompt: prompt.to_string(),
            created_at: Utc::now(),
        };
        self.agents.insert(agent.id.clone(), agent.clone());
        agent
    }

    pub fn add_meeting(&self, agent_id: &str, status: MeetingStatus) -> Meeting {
        let now = Utc::now();
        let meeting = Meeting {
            id: generate_ulid(),
            name: "Test Meeting".to_string(),
            user_id: generate_ulid(),
            agent_id: agent_id.to_string(),
            status,
            external_call_ref: None,
            started_at: None,
            ended_at: None,
            transcript_url: None,
            recording_url: None,
            summary: None,
            created_at: now,
            updated_at: now,
        };
        self.meetings.insert(meeting.id.clone(), meeting.clone());
        meeting
    }

    /// Replaces a stored meeting as-is, bypassing lifecycle checks. Test setup only.
    pub fn put_meeting(&self, meeting: Meeting) {
        self.meetings.insert(meeting.id.clone(), meeting);
    }

    pub fn meeting(&self, id: &str) -> Option<Meeting> {
        self.meetings.get(id).map(|m| m.clone())
    }

    /// Number of successful meeting writes (inserts and applied updates).
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_speaker_lookups(&self, fail: bool) {
        self.fail_speaker_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn fail_meeting_writes(&self, fail: bool) {
        self.fail_meeting_writes.store(fail, Ordering::SeqCst);
    }

    fn check_speaker_lookup(&self) -> Result<(), DatabaseError> {
        if self.fail_speaker_lookups.load(Ordering::SeqCst) {
            return Err(DatabaseError::NotFound("speaker lookup disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MeetingStore for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Meeting>, DatabaseError> {
        Ok(self.meeting(id))
    }

    async fn insert(&self, meeting: NewMeeting) -> Result<Meeting, DatabaseError> {
        if !self.agents.contains_key(&meeting.agent_id) {
            return Err(DatabaseError::ConstraintViolation(format!(
                "Meeting {} references an unknown user or agent",
                meeting.id
            )));
        }
        let now = Utc::now();
        let created = Meeting {
            id: meeting.id,
            name: meeting.name,
            user_id: meeting.user_id,
            agent_id: meeting.agent_id,
            status: MeetingStatus::Upcoming,
            external_call_ref: None,
            started_at: None,
            ended_at: None,
            transcript_url: None,
            recording_url: None,
            summary: None,
            created_at: now,
            updated_at: now,
        };
        self.meetings.insert(created.id.clone(), created.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn update_if(
        &self,
        id: &str,
        allowed: &[MeetingStatus],
        update: MeetingUpdate,
    ) -> Result<Option<Meeting>, DatabaseError> {
        if self.fail_meeting_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::NotFound("meeting writes disabled".to_string()));
        }

        let permitted = update.permitted_from(allowed);
        match self.meetings.get_mut(id) {
            Some(mut meeting) if permitted.contains(&meeting.status) => {
                update.apply(&mut meeting, Utc::now());
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(Some(meeting.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl AgentStore for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Agent>, DatabaseError> {
        Ok(self.agents.get(id).map(|a| a.clone()))
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Agent>, DatabaseError> {
        self.check_speaker_lookup()?;
        Ok(ids
            .iter()
            .filter_map(|id| self.agents.get(id).map(|a| a.clone()))
            .collect())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<User>, DatabaseError> {
        self.check_speaker_lookup()?;
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| u.clone()))
            .collect())
    }
}

/// Job dispatcher and step journal with the same dedup semantics as `JobQueue`.
#[derive(Default)]
pub struct InMemoryJobQueue {
    jobs: DashMap<String, String>,
    enqueued: Mutex<Vec<ProcessingRequest>>,
    steps: DashMap<(String, String), JsonValue>,
    dispatch_calls: AtomicUsize,
    fail_dispatch: AtomicBool,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueued(&self) -> Vec<ProcessingRequest> {
        self.enqueued
            .lock()
            .map(|jobs| jobs.clone())
            .unwrap_or_default()
    }

    pub fn dispatch_calls(&self) -> usize {
        self.dispatch_calls.load(Ordering::SeqCst)
    }

    pub fn fail_dispatch(&self, fail: bool) {
        self.fail_dispatch.store(fail, Ordering::SeqCst);
    }

    pub fn recorded_step(&self, job_id: &str, step: &str) -> Option<JsonValue> {
        self.steps
            .get(&(job_id.to_string(), step.to_string()))
            .map(|v| v.clone())
    }
}

#[async_trait]
impl JobDispatcher for InMemoryJobQueue {
    async fn dispatch(&self, request: &ProcessingRequest) -> Result<DispatchOutcome> {
        self.dispatch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_dispatch.load(Ordering::SeqCst) {
            return Err(anyhow!("job queue unavailable"));
        }

        match self.jobs.entry(request.dedup_key()) {
            Entry::Occupied(_) => Ok(DispatchOutcome::Duplicate),
            Entry::Vacant(slot) => {
                let id = generate_ulid();
                slot.insert(id.clone());
                if let Ok(mut jobs) = self.enqueued.lock() {
                    jobs.push(request.clone());
                }
                Ok(DispatchOutcome::Enqueued(id))
            }
        }
    }
}

#[async_trait]
impl StepJournal for InMemoryJobQueue {
    async fn load_step(&self, job_id: &str, step: &str) -> Result<Option<JsonValue>> {
        Ok(self.recorded_step(job_id, step))
    }

    async fn record_step(&self, job_id: &str, step: &str, output: &JsonValue) -> Result<()> {
        self.steps
            .insert((job_id.to_string(), step.to_string()), output.clone());
        Ok(())
    }
}
