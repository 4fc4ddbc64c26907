use anyhow::{Context, Result};
use parley_webhooks::chat::FollowUpResponder;
use parley_webhooks::config::WebhookServiceConfig;
use parley_webhooks::lifecycle::MeetingLifecycle;
use parley_webhooks::signature::WebhookVerifier;
use parley_webhooks::voice_agent::{RealtimeBridge, VoiceSettings};
use parley_webhooks::{create_app, AppState};
use shared::db::repositories::{AgentRepository, MeetingRepository};
use shared::telemetry::{init_telemetry, TelemetryConfig};
use shared::{DatabasePool, JobQueue, LanguageModel, OpenAiClient, StreamClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_telemetry(TelemetryConfig::from_env("parley-webhooks"))?;

    let config = WebhookServiceConfig::from_env()?;
    info!("Starting webhook service on port {}", config.port);

    let db_pool = DatabasePool::from_config(&config.database).await?;
    db_pool.run_migrations().await?;
    let pool = db_pool.pool().clone();

    let meetings = Arc::new(MeetingRepository::new(&pool));
    let agents = Arc::new(AgentRepository::new(&pool));
    let stream = Arc::new(StreamClient::new(&config.stream)?);
    let dispatcher = Arc::new(JobQueue::new(pool.clone()));

    let mut lifecycle =
        MeetingLifecycle::new(meetings.clone(), agents.clone(), dispatcher, stream.clone());

    let model: Option<Arc<dyn LanguageModel>> = match &config.openai.api_key {
        Some(api_key) => {
            match &config.voice_agent_bridge_url {
                Some(bridge_url) => {
                    let bridge = RealtimeBridge::new(bridge_url, api_key.clone())?;
                    lifecycle = lifecycle
                        .with_voice_agent(Arc::new(bridge), VoiceSettings::from(&config.openai));
                    info!("Voice agent enabled via {}", bridge_url);
                }
                None => warn!("VOICE_AGENT_BRIDGE_URL is not set, voice agent disabled"),
            }
            Some(Arc::new(OpenAiClient::from_config(&config.openai)?))
        }
        None => {
            warn!("OPENAI_API_KEY is not set, voice agent and chat replies disabled");
            None
        }
    };

    let responder = FollowUpResponder::new(meetings.clone(), agents.clone(), stream.clone(), model);

    let state = AppState {
        meetings,
        agents,
        verifier: WebhookVerifier::new(stream.api_secret()),
        lifecycle: Arc::new(lifecycle),
        responder: Arc::new(responder),
    };

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Webhook service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
