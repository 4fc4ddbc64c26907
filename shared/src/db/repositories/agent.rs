use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::error::DatabaseError;
use crate::models::Agent;
use crate::traits::AgentStore;

pub struct AgentRepository {
    pool: PgPool,
}

impl AgentRepository {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn create(&self, agent: Agent) -> Result<Agent, DatabaseError> {
        let created = sqlx::query_as::<_, Agent>(
            r#"
            INSERT INTO agents (id, name, user_id, prompt)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, user_id, prompt, created_at
            "#,
        )
        .bind(&agent.id)
        .bind(&agent.name)
        .bind(&agent.user_id)
        .bind(&agent.prompt)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }
}

#[async_trait]
impl AgentStore for AgentRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Agent>, DatabaseError> {
        let agent = sqlx::query_as::<_, Agent>(
            "SELECT id, name, user_id, prompt, created_at FROM agents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(agent)
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Agent>, DatabaseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let agents = sqlx::query_as::<_, Agent>(
            "SELECT id, name, user_id, prompt, created_at FROM agents WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(agents)
    }
}
