use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::error::DatabaseError;
use crate::models::{Meeting, MeetingStatus, MeetingUpdate, NewMeeting};
use crate::traits::MeetingStore;

const MEETING_COLUMNS: &str = r#"
    id, name, user_id, agent_id, status, external_call_ref,
    started_at, ended_at, transcript_url, recording_url, summary,
    created_at, updated_at
"#;

pub struct MeetingRepository {
    pool: PgPool,
}

impl MeetingRepository {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }
}

#[async_trait]
impl MeetingStore for MeetingRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Meeting>, DatabaseError> {
        let meeting = sqlx::query_as::<_, Meeting>(&format!(
            "SELECT {} FROM meetings WHERE id = $1",
            MEETING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(meeting)
    }

    async fn insert(&self, meeting: NewMeeting) -> Result<Meeting, DatabaseError> {
        let created = sqlx::query_as::<_, Meeting>(&format!(
            r#"
            INSERT INTO meetings (id, name, user_id, agent_id, status)
            VALUES ($1, $2, $3, $4, 'upcoming')
            RETURNING {}
            "#,
            MEETING_COLUMNS
        ))
        .bind(&meeting.id)
        .bind(&meeting.name)
        .bind(&meeting.user_id)
        .bind(&meeting.agent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DatabaseError::ConstraintViolation(format!(
                    "Meeting {} references an unknown user or agent",
                    meeting.id
                ))
            }
            _ => DatabaseError::from(e),
        })?;

        Ok(created)
    }

    async fn update_if(
        &self,
        id: &str,
        allowed: &[MeetingStatus],
        update: MeetingUpdate,
    ) -> Result<Option<Meeting>, DatabaseError> {
        let allowed: Vec<String> = update
            .permitted_from(allowed)
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        if allowed.is_empty() {
            return Ok(None);
        }

        // Single statement: the status check and the write happen atomically per row.
        let updated = sqlx::query_as::<_, Meeting>(&format!(
            r#"
            UPDATE meetings
            SET status = COALESCE($3, status),
                started_at = COALESCE(started_at, $4),
                ended_at = COALESCE(ended_at, $5),
                external_call_ref = COALESCE(external_call_ref, $6),
                transcript_url = COALESCE($7, transcript_url),
                recording_url = COALESCE($8, recording_url),
                summary = COALESCE($9, summary),
                updated_at = NOW()
            WHERE id = $1 AND status::text = ANY($2)
            RETURNING {}
            "#,
            MEETING_COLUMNS
        ))
        .bind(id)
        .bind(&allowed)
        .bind(update.status)
        .bind(update.started_at)
        .bind(update.ended_at)
        .bind(&update.external_call_ref)
        .bind(&update.transcript_url)
        .bind(&update.recording_url)
        .bind(&update.summary)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }
}
