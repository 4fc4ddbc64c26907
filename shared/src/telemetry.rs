use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{runtime, trace::TracerProvider, Resource};
use std::env;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub default_log_level: String,
    pub json_logs: bool,
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    pub fn from_env(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            default_log_level: "info".to_string(),
            json_logs: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }
}

fn init_tracer_provider(service_name: &str, endpoint: &str) -> Result<TracerProvider> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_endpoint(format!("{}/v1/traces", endpoint.trim_end_matches('/')))
        .build()
        .context("Failed to build OTLP span exporter")?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.to_string(),
        )]))
        .build();

    Ok(provider)
}

/// Installs the global tracing subscriber. Spans are exported over OTLP only when an
/// endpoint is configured.
pub fn init_telemetry(config: TelemetryConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    let otel_layer = match &config.otlp_endpoint {
        Some(endpoint) => {
            let provider = init_tracer_provider(&config.service_name, endpoint)?;
            let tracer = provider.tracer(config.service_name.clone());
            opentelemetry::global::set_tracer_provider(provider);
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    let registry = tracing_subscriber::registry().with(env_filter).with(otel_layer);

    if config.json_logs {
        registry
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to install tracing subscriber")?;
    } else {
        registry
            .with(fmt::layer())
            .try_init()
            .context("Failed to install tracing subscriber")?;
    }

    tracing::info!(
        "Telemetry initialized for {} (otlp: {})",
        config.service_name,
        config.otlp_endpoint.as_deref().unwrap_or("disabled")
    );

    Ok(())
}

pub mod middleware {
    use axum::{extract::Request, middleware::Next, response::Response};
    use std::time::Instant;
    use tracing::{info, info_span, warn, Instrument};

    /// Request span plus one access log line per request.
    pub async fn trace_layer(request: Request, next: Next) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let span = info_span!("http_request", method = %method, path = %path);

        let started = Instant::now();
        let response = next.run(request).instrument(span.clone()).await;
        let status = response.status();
        let elapsed = started.elapsed();

        if status.is_server_error() {
            warn!(parent: &span, "{} {} -> {} in {:?}", method, path, status.as_u16(), elapsed);
        } else {
            info!(parent: &span, "{} {} -> {} in {:?}", method, path, status.as_u16(), elapsed);
        }

        response
    }
}
