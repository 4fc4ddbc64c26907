use anyhow::Result;
use shared::models::ProcessingJob;
use shared::JobQueue;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use crate::pipeline::TranscriptPipeline;

pub struct QueueProcessor {
    pub queue: JobQueue,
    pub pipeline: Arc<TranscriptPipeline>,
    pub batch_size: i32,
    pub stale_job_minutes: i64,
}

impl QueueProcessor {
    pub fn new(queue: JobQueue, pipeline: Arc<TranscriptPipeline>) -> Self {
        Self {
            queue,
            pipeline,
            batch_size: 5,
            stale_job_minutes: 15,
        }
    }

    pub fn with_batch_size(mut self, batch_size: i32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_stale_job_minutes(mut self, minutes: i64) -> Self {
        self.stale_job_minutes = minutes;
        self
    }

    pub async fn start(&self) -> Result<()> {
        info!("Starting queue processor with batch size: {}", self.batch_size);

        let mut poll_interval = interval(Duration::from_secs(1));
        let mut heartbeat_interval = interval(Duration::from_secs(30));
        let mut retry_interval = interval(Duration::from_secs(300));
        let mut stale_interval = interval(Duration::from_secs(60));

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    if let Err(e) = self.process_batch().await {
                        error!("Failed to process batch: {:#}", e);
                    }
                }
                _ = heartbeat_interval.tick() => {
                    if let Ok(stats) = self.queue.get_queue_stats().await {
                        info!(
                            "Queue stats - Pending: {}, Processing: {}, Completed: {}, Failed: {}, Dead Letter: {}",
                            stats.pending,
                            stats.processing,
                            stats.completed,
                            stats.failed,
                            stats.dead_letter
                        );
                    }
                }
                _ = retry_interval.tick() => {
                    if let Ok(retried) = self.queue.retry_failed_jobs().await {
                        if retried > 0 {
                            info!("Retried {} failed jobs", retried);
                        }
                    }
                }
                _ = stale_interval.tick() => {
                    match self.queue.requeue_stale_jobs(self.stale_job_minutes).await {
                        Ok(requeued) if requeued > 0 => info!("Requeued {} stale jobs", requeued),
                        Ok(_) => {}
                        Err(e) => error!("Failed to requeue stale jobs: {:#}", e),
                    }
                }
            }
        }
    }

    pub async fn process_batch(&self) -> Result<usize> {
        let jobs = self.queue.dequeue_batch(self.batch_size).await?;
        let count = jobs.len();

        for job in jobs {
            if let Err(e) = self.process_job(&job).await {
                error!("Failed to record outcome of job {}: {:#}", job.id, e);
            }
        }

        Ok(count)
    }

    async fn process_job(&self, job: &ProcessingJob) -> Result<()> {
        match self.pipeline.run(&job.id, &job.request()).await {
            Ok(_) => self.queue.mark_completed(&job.id).await,
            Err(e) => {
                error!(
                    "Job {} for meeting {} failed (attempt {}): {:#}",
                    job.id,
                    job.meeting_id,
                    job.retry_count + 1,
                    e
                );
                self.queue.mark_failed(&job.id, &format!("{:#}", e)).await
            }
        }
    }
}
