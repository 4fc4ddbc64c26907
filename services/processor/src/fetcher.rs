use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTranscript {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedTranscript {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Downloads transcript files. Non-2xx responses are returned, not raised.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedTranscript>;
}

pub struct HttpTranscriptFetcher {
    client: Client,
}

impl HttpTranscriptFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build transcript HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TranscriptFetcher for HttpTranscriptFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedTranscript> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch transcript from {}", url))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .context("Failed to read transcript body")?;

        Ok(FetchedTranscript {
            status,
            content_type,
            body,
        })
    }
}
