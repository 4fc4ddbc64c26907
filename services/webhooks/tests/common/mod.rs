#![allow(dead_code)]

pub mod fakes;

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestResponse, TestServer};
use fakes::{RecordingCallPlatform, RecordingChatPlatform, RecordingVoiceAgent, ScriptedModel};
use parley_webhooks::chat::FollowUpResponder;
use parley_webhooks::lifecycle::MeetingLifecycle;
use parley_webhooks::signature::WebhookVerifier;
use parley_webhooks::voice_agent::VoiceSettings;
use parley_webhooks::{create_app, AppState};
use serde_json::Value as JsonValue;
use shared::testing::{InMemoryJobQueue, InMemoryStore};
use shared::LanguageModel;
use std::sync::Arc;

pub const TEST_SECRET: &str = "test-stream-secret";

pub struct TestFixture {
    pub store: Arc<InMemoryStore>,
    pub queue: Arc<InMemoryJobQueue>,
    pub calls: Arc<RecordingCallPlatform>,
    pub voice: Arc<RecordingVoiceAgent>,
    pub chat: Arc<RecordingChatPlatform>,
    pub model: Arc<ScriptedModel>,
    pub lifecycle: Arc<MeetingLifecycle>,
    pub verifier: WebhookVerifier,
    pub app: axum::Router,
}

pub fn voice_settings() -> VoiceSettings {
    VoiceSettings {
        model: "gpt-4o-realtime-preview".to_string(),
        voice: "verse".to_string(),
        greeting: "Hi everyone".to_string(),
    }
}

pub fn setup_test_fixture() -> TestFixture {
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(InMemoryJobQueue::new());
    let calls = Arc::new(RecordingCallPlatform::default());
    let voice = Arc::new(RecordingVoiceAgent::default());
    let chat = Arc::new(RecordingChatPlatform::default());
    let model = Arc::new(ScriptedModel::replying("Here is what was decided."));

    let lifecycle = Arc::new(
        MeetingLifecycle::new(store.clone(), store.clone(), queue.clone(), calls.clone())
            .with_voice_agent(voice.clone(), voice_settings()),
    );
    let responder = Arc::new(FollowUpResponder::new(
        store.clone(),
        store.clone(),
        chat.clone(),
        Some(model.clone() as Arc<dyn LanguageModel>),
    ));
    let verifier = WebhookVerifier::new(TEST_SECRET);

    let state = AppState {
        meetings: store.clone(),
        agents: store.clone(),
        verifier: verifier.clone(),
        lifecycle: lifecycle.clone(),
        responder,
    };

    TestFixture {
        store,
        queue,
        calls,
        voice,
        chat,
        model,
        lifecycle,
        verifier,
        app: create_app(state),
    }
}

impl TestFixture {
    pub fn server(&self) -> TestServer {
        TestServer::new(self.app.clone()).unwrap()
    }

    /// Posts `payload` to the webhook endpoint with a valid signature.
    pub async fn deliver(&self, server: &TestServer, payload: &JsonValue) -> TestResponse {
        let body = payload.to_string();
        let signature = self.verifier.sign(body.as_bytes());
        server
            .post("/api/webhook")
            .add_header(
                HeaderName::from_static("x-signature"),
                HeaderValue::from_str(&signature).unwrap(),
            )
            .bytes(Bytes::from(body))
            .await
    }
}
