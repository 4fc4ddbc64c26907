#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parley_processor::fetcher::{FetchedTranscript, TranscriptFetcher};
use parley_processor::pipeline::TranscriptPipeline;
use shared::testing::{InMemoryJobQueue, InMemoryStore};
use shared::{ChatMessage, LanguageModel};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TRANSCRIPT_URL: &str = "https://cdn.example/transcripts/call.jsonl";

/// Serves one fixed response, or a transport error when the body is `None`.
pub struct StubFetcher {
    status: u16,
    body: Mutex<Option<String>>,
    pub calls: AtomicUsize,
}

impl StubFetcher {
    pub fn ok(body: &str) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: Mutex::new(Some(body.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            status: 0,
            body: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Replaces the served body, for transcripts that embed generated ids.
    pub fn serve(&self, body: &str) {
        *self.body.lock().unwrap() = Some(body.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedTranscript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.body.lock().unwrap().clone() {
            Some(body) => Ok(FetchedTranscript {
                status: self.status,
                content_type: Some("application/jsonl".to_string()),
                body,
            }),
            None => Err(anyhow!("connection refused: {}", url)),
        }
    }
}

/// Summarizer stand-in with a fixed answer, or an error when the answer is `None`.
pub struct StubModel {
    answer: Option<String>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl StubModel {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.answer
            .clone()
            .ok_or_else(|| anyhow!("summarizer timed out"))
    }
}

pub struct PipelineFixture {
    pub store: Arc<InMemoryStore>,
    pub journal: Arc<InMemoryJobQueue>,
    pub fetcher: Arc<StubFetcher>,
    pub model: Arc<StubModel>,
    pub pipeline: TranscriptPipeline,
}

pub fn pipeline_fixture(fetcher: StubFetcher, model: StubModel) -> PipelineFixture {
    let store = Arc::new(InMemoryStore::new());
    let journal = Arc::new(InMemoryJobQueue::new());
    let fetcher = Arc::new(fetcher);
    let model = Arc::new(model);

    let pipeline = TranscriptPipeline::new(
        fetcher.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        journal.clone(),
        Some(model.clone() as Arc<dyn LanguageModel>),
    );

    PipelineFixture {
        store,
        journal,
        fetcher,
        model,
        pipeline,
    }
}

pub const SAMPLE_SUMMARY: &str = "### Overview\nThe team agreed to ship on Friday.\n\n### Notes\n#### Release\n- Ship Friday";

/// Two speakers known to the store plus one stranger.
pub fn jsonl_transcript(user_id: &str, agent_id: &str) -> String {
    [
        format!(r#"{{"type":"speech","speaker_id":"{}","text":"Can we ship Friday?","start_ts":0,"stop_ts":1800}}"#, user_id),
        format!(r#"{{"type":"speech","speaker_id":"{}","text":"Noted, Friday it is.","start_ts":1900,"stop_ts":3200}}"#, agent_id),
        r#"{"type":"speech","speaker_id":"guest-42","text":"Works for me.","start_ts":3300,"stop_ts":4100}"#.to_string(),
    ]
    .join("\n")
}
