use anyhow::{Context, Result};
use parley_processor::config::ProcessorConfig;
use parley_processor::fetcher::HttpTranscriptFetcher;
use parley_processor::pipeline::TranscriptPipeline;
use parley_processor::queue_processor::QueueProcessor;
use parley_processor::{create_app, AppState};
use shared::db::repositories::{AgentRepository, MeetingRepository, UserRepository};
use shared::telemetry::{init_telemetry, TelemetryConfig};
use shared::{DatabasePool, JobQueue, LanguageModel, OpenAiClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_telemetry(TelemetryConfig::from_env("parley-processor"))?;

    let config = ProcessorConfig::from_env()?;
    info!("Starting transcript processor on port {}", config.port);

    let db_pool = DatabasePool::from_config(&config.database).await?;
    db_pool.run_migrations().await?;
    let pool = db_pool.pool().clone();

    let queue = JobQueue::new(pool.clone());

    let model: Option<Arc<dyn LanguageModel>> = match config.openai.api_key {
        Some(_) => {
            let client = OpenAiClient::from_config(&config.openai)?;
            info!("Summaries use model {}", client.model());
            Some(Arc::new(client))
        }
        None => {
            warn!("OPENAI_API_KEY is not set, meetings will complete with a fallback summary");
            None
        }
    };

    let pipeline = Arc::new(TranscriptPipeline::new(
        Arc::new(HttpTranscriptFetcher::new()?),
        Arc::new(MeetingRepository::new(&pool)),
        Arc::new(AgentRepository::new(&pool)),
        Arc::new(UserRepository::new(&pool)),
        Arc::new(queue.clone()),
        model,
    ));

    let processor = QueueProcessor::new(queue.clone(), pipeline)
        .with_batch_size(config.batch_size)
        .with_stale_job_minutes(config.stale_job_minutes);

    tokio::spawn(async move {
        if let Err(e) = processor.start().await {
            error!("Queue processor stopped: {:#}", e);
        }
    });

    let app = create_app(AppState {
        queue: Arc::new(queue),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Processor health endpoint listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
