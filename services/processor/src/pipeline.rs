//! Transcript processing pipeline.
//!
//! A job runs five named steps in order. Every step yields a [`StepOutcome`],
//! either its real value or a fallback with the reason it degraded, and the
//! outcome is journaled against the job id. A retried job replays journaled
//! steps instead of executing them again, so a crash in `save-summary` does
//! not re-run the model call. The last step always drives the meeting to
//! `completed` with whatever summary the earlier steps produced.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::models::{MeetingStatus, MeetingUpdate, ProcessingRequest};
use shared::utils::preview;
use shared::{AgentStore, LanguageModel, MeetingStore, StepJournal, UserStore};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::fetcher::TranscriptFetcher;
use crate::summarizer::summary_request;
use crate::transcript::{
    enrich, parse_transcript, speaker_ids, EnrichedItem, ParsedTranscript, TranscriptItem,
};

pub const STEP_FETCH: &str = "fetch-transcript";
pub const STEP_PARSE: &str = "parse-transcript";
pub const STEP_ADD_SPEAKERS: &str = "add-speakers";
pub const STEP_SUMMARIZE: &str = "summarize";
pub const STEP_SAVE_SUMMARY: &str = "save-summary";

pub const SUMMARY_FAILED_FALLBACK: &str =
    "Summary generation failed. Transcript has been processed, but no summary could be generated.";
pub const NO_SUMMARY_FALLBACK: &str = "No summary available.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum StepOutcome<T> {
    Success(T),
    Degraded { value: T, reason: String },
}

impl<T> StepOutcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Success(value) | Self::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Success(value) | Self::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// What a finished job left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    pub summary: String,
    pub item_count: usize,
    pub degraded_steps: Vec<&'static str>,
}

impl PipelineRun {
    pub fn used_fallback(&self) -> bool {
        self.summary == SUMMARY_FAILED_FALLBACK || self.summary == NO_SUMMARY_FALLBACK
    }
}

/// Picks the summary the save step persists.
pub fn final_summary(summarize: &StepOutcome<Option<String>>) -> String {
    match summarize {
        StepOutcome::Success(Some(text)) => text.clone(),
        StepOutcome::Degraded { .. } => SUMMARY_FAILED_FALLBACK.to_string(),
        StepOutcome::Success(None) => NO_SUMMARY_FALLBACK.to_string(),
    }
}

pub struct TranscriptPipeline {
    fetcher: Arc<dyn TranscriptFetcher>,
    meetings: Arc<dyn MeetingStore>,
    agents: Arc<dyn AgentStore>,
    users: Arc<dyn UserStore>,
    journal: Arc<dyn StepJournal>,
    model: Option<Arc<dyn LanguageModel>>,
}

impl TranscriptPipeline {
    pub fn new(
        fetcher: Arc<dyn TranscriptFetcher>,
        meetings: Arc<dyn MeetingStore>,
        agents: Arc<dyn AgentStore>,
        users: Arc<dyn UserStore>,
        journal: Arc<dyn StepJournal>,
        model: Option<Arc<dyn LanguageModel>>,
    ) -> Self {
        Self {
            fetcher,
            meetings,
            agents,
            users,
            journal,
            model,
        }
    }

    pub async fn run(&self, job_id: &str, request: &ProcessingRequest) -> Result<PipelineRun> {
        let meeting_id = request.meeting_id.as_str();
        info!("Processing transcript for meeting {} (job {})", meeting_id, job_id);

        let mut degraded_steps = Vec::new();
        let mut note = |step: &'static str, degraded: bool| {
            if degraded {
                degraded_steps.push(step);
            }
        };

        let body = self
            .run_step(job_id, STEP_FETCH, || {
                self.fetch(meeting_id, &request.transcript_url)
            })
            .await?;
        note(STEP_FETCH, body.is_degraded());

        let items = self
            .run_step(job_id, STEP_PARSE, || async {
                Ok(self.parse(meeting_id, body.value()))
            })
            .await?;
        note(STEP_PARSE, items.is_degraded());
        let item_count = items.value().len();

        let enriched = self
            .run_step(job_id, STEP_ADD_SPEAKERS, || {
                self.add_speakers(meeting_id, items.into_value())
            })
            .await?;
        note(STEP_ADD_SPEAKERS, enriched.is_degraded());

        let summary = self
            .run_step(job_id, STEP_SUMMARIZE, || {
                self.summarize(meeting_id, enriched.value())
            })
            .await?;
        note(STEP_SUMMARIZE, summary.is_degraded());

        let saved = self
            .run_step(job_id, STEP_SAVE_SUMMARY, || {
                self.save_summary(meeting_id, &summary)
            })
            .await?;
        note(STEP_SAVE_SUMMARY, saved.is_degraded());

        let run = PipelineRun {
            summary: saved.into_value(),
            item_count,
            degraded_steps,
        };
        info!(
            "Finished meeting {} (job {}): {} items, fallback summary: {}, degraded steps: {:?}",
            meeting_id,
            job_id,
            run.item_count,
            run.used_fallback(),
            run.degraded_steps
        );
        Ok(run)
    }

    /// Replays the journaled outcome of `step` for this job, or runs it and
    /// journals the result.
    async fn run_step<T, F, Fut>(
        &self,
        job_id: &str,
        step: &'static str,
        run: F,
    ) -> Result<StepOutcome<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StepOutcome<T>>>,
    {
        if let Some(recorded) = self.journal.load_step(job_id, step).await? {
            match serde_json::from_value(recorded) {
                Ok(outcome) => {
                    debug!("Job {} replaying recorded step {}", job_id, step);
                    return Ok(outcome);
                }
                Err(e) => warn!(
                    "Job {} has an unreadable record for step {}, running it again: {}",
                    job_id, step, e
                ),
            }
        }

        let outcome = run().await?;
        if let StepOutcome::Degraded { reason, .. } = &outcome {
            warn!("Job {} step {} degraded: {}", job_id, step, reason);
        }

        let recorded = serde_json::to_value(&outcome)
            .with_context(|| format!("Failed to serialize output of step {}", step))?;
        self.journal.record_step(job_id, step, &recorded).await?;

        Ok(outcome)
    }

    async fn fetch(&self, meeting_id: &str, url: &str) -> Result<StepOutcome<String>> {
        debug!("Fetching transcript for meeting {} from {}", meeting_id, url);

        let fetched = match self.fetcher.fetch(url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!("Transcript fetch for meeting {} failed: {:#}", meeting_id, e);
                return Ok(StepOutcome::degraded(String::new(), format!("{:#}", e)));
            }
        };

        info!(
            "Fetched transcript for meeting {}: HTTP {}, {} bytes, content type {}",
            meeting_id,
            fetched.status,
            fetched.body.len(),
            fetched.content_type.as_deref().unwrap_or("unknown")
        );
        debug!("Transcript preview for meeting {}: {}", meeting_id, preview(&fetched.body, 200));

        if !fetched.is_success() {
            error!(
                "Transcript URL for meeting {} returned HTTP {}",
                meeting_id, fetched.status
            );
        }

        Ok(StepOutcome::Success(fetched.body))
    }

    fn parse(&self, meeting_id: &str, body: &str) -> StepOutcome<Vec<TranscriptItem>> {
        match parse_transcript(body) {
            ParsedTranscript::Items(items) => {
                info!("Parsed {} transcript items for meeting {}", items.len(), meeting_id);
                StepOutcome::Success(items)
            }
            ParsedTranscript::Fallback { items, error } => {
                warn!(
                    "Transcript for meeting {} is not valid JSONL, using {} raw lines",
                    meeting_id,
                    items.len()
                );
                StepOutcome::degraded(items, format!("invalid JSONL at {}", error))
            }
        }
    }

    async fn speaker_names(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        let users = self.users.find_by_ids(ids).await?;
        let agents = self.agents.find_by_ids(ids).await?;
        debug!("Resolved {} users and {} agents", users.len(), agents.len());

        let mut names: HashMap<String, String> =
            users.into_iter().map(|user| (user.id, user.name)).collect();
        for agent in agents {
            names.entry(agent.id).or_insert(agent.name);
        }
        Ok(names)
    }

    async fn add_speakers(
        &self,
        meeting_id: &str,
        items: Vec<TranscriptItem>,
    ) -> Result<StepOutcome<Vec<EnrichedItem>>> {
        let ids = speaker_ids(&items);
        if ids.is_empty() {
            return Ok(StepOutcome::Success(Vec::new()));
        }

        match self.speaker_names(&ids).await {
            Ok(names) => {
                info!(
                    "Matched {} of {} speakers for meeting {}",
                    names.len(),
                    ids.len(),
                    meeting_id
                );
                Ok(StepOutcome::Success(enrich(items, &names)))
            }
            Err(e) => Ok(StepOutcome::degraded(
                enrich(items, &HashMap::new()),
                format!("speaker lookup failed: {:#}", e),
            )),
        }
    }

    async fn summarize(
        &self,
        meeting_id: &str,
        items: &[EnrichedItem],
    ) -> Result<StepOutcome<Option<String>>> {
        if items.is_empty() {
            info!("Meeting {} has an empty transcript, skipping summary", meeting_id);
            return Ok(StepOutcome::Success(None));
        }

        let Some(model) = &self.model else {
            return Ok(StepOutcome::degraded(None, "no language model configured"));
        };

        let result = match summary_request(items) {
            Ok(messages) => model.complete(&messages).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(text) if text.trim().is_empty() => {
                warn!("Summarizer returned no content for meeting {}", meeting_id);
                Ok(StepOutcome::Success(None))
            }
            Ok(text) => {
                info!(
                    "Summarized meeting {}: {}",
                    meeting_id,
                    preview(&text, 120)
                );
                Ok(StepOutcome::Success(Some(text)))
            }
            Err(e) => {
                error!("Summarizer failed for meeting {}: {:#}", meeting_id, e);
                Ok(StepOutcome::degraded(None, format!("{:#}", e)))
            }
        }
    }

    async fn save_summary(
        &self,
        meeting_id: &str,
        summarize: &StepOutcome<Option<String>>,
    ) -> Result<StepOutcome<String>> {
        let summary = final_summary(summarize);

        let updated = self
            .meetings
            .update_if(
                meeting_id,
                &MeetingStatus::NOT_CANCELLED,
                MeetingUpdate::status(MeetingStatus::Completed).with_summary(&summary),
            )
            .await
            .with_context(|| format!("Failed to save summary for meeting {}", meeting_id))?;

        match updated {
            Some(_) => {
                info!("Meeting {} completed", meeting_id);
                Ok(StepOutcome::Success(summary))
            }
            None => {
                warn!(
                    "Meeting {} is missing or cancelled, summary not saved",
                    meeting_id
                );
                Ok(StepOutcome::degraded(summary, "meeting missing or cancelled"))
            }
        }
    }
}
