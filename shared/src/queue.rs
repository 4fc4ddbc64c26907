use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use ulid::Ulid;

use crate::models::{ProcessingJob, ProcessingRequest};
use crate::traits::{DispatchOutcome, JobDispatcher, StepJournal};

const JOB_COLUMNS: &str = r#"
    id, meeting_id, transcript_url, dedup_key, status, retry_count, max_retries,
    created_at, started_at, processed_at, error_message
"#;

/// Postgres-backed queue of transcript processing jobs.
#[derive(Clone)]
pub struct JobQueue {
    pool: PgPool,
}

impl JobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(&self, request: &ProcessingRequest) -> Result<Option<String>> {
        let id = Ulid::new().to_string();

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO processing_jobs (id, meeting_id, transcript_url, dedup_key)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (dedup_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&id)
        .bind(&request.meeting_id)
        .bind(&request.transcript_url)
        .bind(request.dedup_key())
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query("NOTIFY processing_jobs")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(id))
    }

    pub async fn dequeue_batch(&self, batch_size: i32) -> Result<Vec<ProcessingJob>> {
        let jobs = sqlx::query_as::<_, ProcessingJob>(
            r#"
            WITH batch AS (
                SELECT id
                FROM processing_jobs
                WHERE status = 'pending'
                ORDER BY created_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE processing_jobs q
            SET status = 'processing', started_at = NOW()
            FROM batch
            WHERE q.id = batch.id
            RETURNING
                q.id, q.meeting_id, q.transcript_url, q.dedup_key, q.status,
                q.retry_count, q.max_retries, q.created_at, q.started_at,
                q.processed_at, q.error_message
            "#,
        )
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    pub async fn find_by_id(&self, job_id: &str) -> Result<Option<ProcessingJob>> {
        let job = sqlx::query_as::<_, ProcessingJob>(&format!(
            "SELECT {} FROM processing_jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    pub async fn mark_completed(&self, job_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE processing_jobs
            SET status = 'completed', processed_at = NOW(), error_message = NULL
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_failed(&self, job_id: &str, error: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE processing_jobs
            SET
                retry_count = retry_count + 1,
                error_message = $2,
                status = CASE
                    WHEN retry_count + 1 >= max_retries THEN 'dead_letter'::job_status
                    ELSE 'failed'::job_status
                END
            WHERE id = $1
            RETURNING retry_count, max_retries
            "#,
        )
        .bind(job_id)
        .bind(error)
        .fetch_one(&self.pool)
        .await?;

        let retry_count: i32 = result.get("retry_count");
        let max_retries: i32 = result.get("max_retries");

        if retry_count >= max_retries {
            tracing::error!(
                "Job {} moved to dead letter queue after {} retries",
                job_id,
                retry_count
            );
        }

        Ok(())
    }

    pub async fn retry_failed_jobs(&self) -> Result<i64> {
        let result = sqlx::query(
            r#"
            UPDATE processing_jobs
            SET status = 'pending'
            WHERE status = 'failed'
            AND retry_count < max_retries
            AND created_at > NOW() - INTERVAL '24 hours'
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as i64)
    }

    /// Returns jobs stuck in `processing` (worker crashed mid-run) to `pending`.
    /// Each requeue counts as an attempt, so a job that keeps killing its
    /// worker ends in `dead_letter`. Journaled steps are replayed instead of
    /// re-executed.
    pub async fn requeue_stale_jobs(&self, stale_after_minutes: i64) -> Result<i64> {
        let result = sqlx::query(
            r#"
            UPDATE processing_jobs
            SET
                retry_count = retry_count + 1,
                error_message = 'Worker stopped before finishing',
                status = CASE
                    WHEN retry_count + 1 >= max_retries THEN 'dead_letter'::job_status
                    ELSE 'pending'::job_status
                END
            WHERE status = 'processing'
            AND started_at < NOW() - make_interval(mins => $1::int)
            "#,
        )
        .bind(stale_after_minutes as i32)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as i64)
    }

    pub async fn get_queue_stats(&self) -> Result<QueueStats> {
        let rows = sqlx::query(
            r#"
            SELECT
                status::text AS status,
                COUNT(*) AS count
            FROM processing_jobs
            WHERE created_at > NOW() - INTERVAL '24 hours'
            GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = QueueStats::default();

        for row in rows {
            let status: String = row.get("status");
            let count: i64 = row.get("count");

            match status.as_str() {
                "pending" => stats.pending = count,
                "processing" => stats.processing = count,
                "completed" => stats.completed = count,
                "failed" => stats.failed = count,
                "dead_letter" => stats.dead_letter = count,
                _ => {}
            }
        }

        Ok(stats)
    }
}

#[async_trait]
impl JobDispatcher for JobQueue {
    async fn dispatch(&self, request: &ProcessingRequest) -> Result<DispatchOutcome> {
        match self.enqueue(request).await? {
            Some(id) => Ok(DispatchOutcome::Enqueued(id)),
            None => Ok(DispatchOutcome::Duplicate),
        }
    }
}

#[async_trait]
impl StepJournal for JobQueue {
    async fn load_step(&self, job_id: &str, step: &str) -> Result<Option<JsonValue>> {
        let row = sqlx::query(
            "SELECT output FROM processing_job_steps WHERE job_id = $1 AND step_name = $2",
        )
        .bind(job_id)
        .bind(step)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get("output")))
    }

    async fn record_step(&self, job_id: &str, step: &str, output: &JsonValue) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO processing_job_steps (job_id, step_name, output)
            VALUES ($1, $2, $3)
            ON CONFLICT (job_id, step_name)
            DO UPDATE SET output = EXCLUDED.output, recorded_at = NOW()
            "#,
        )
        .bind(job_id)
        .bind(step)
        .bind(output)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub dead_letter: i64,
}
