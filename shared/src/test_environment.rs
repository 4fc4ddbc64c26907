use anyhow::Result;
use chrono::Utc;
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;

use crate::config::DatabaseConfig;
use crate::db::pool::DatabasePool;
use crate::db::repositories::{AgentRepository, MeetingRepository, UserRepository};
use crate::models::{Agent, Meeting, NewMeeting, User};
use crate::traits::MeetingStore;
use crate::utils::generate_ulid;

/// Throwaway Postgres container with migrations applied.
pub struct TestEnvironment {
    pub db_pool: DatabasePool,
    database_url: String,
    _postgres: ContainerAsync<Postgres>,
}

impl TestEnvironment {
    pub async fn new() -> Result<Self> {
        let postgres = Postgres::default().start().await?;
        let host = postgres.get_host().await?;
        let port = postgres.get_host_port_ipv4(5432).await?;
        let database_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

        let db_pool = DatabasePool::new(&database_url).await?;
        db_pool.run_migrations().await?;

        Ok(Self {
            db_pool,
            database_url,
            _postgres: postgres,
        })
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            database_url: self.database_url.clone(),
            max_connections: 5,
            acquire_timeout_seconds: 3,
        }
    }

    pub async fn seed_user(&self, name: &str) -> Result<User> {
        let id = generate_ulid();
        let user = User {
            email: format!("{}@example.com", id.to_lowercase()),
            id,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        Ok(UserRepository::new(self.db_pool.pool()).create(user).await?)
    }

    pub async fn seed_agent(&self, owner: &User, name: &str, prompt: &str) -> Result<Agent> {
        let agent = Agent {
            id: generate_ulid(),
            name: name.to_string(),
            user_id: owner.id.clone(),
            prompt: prompt.to_string(),
            created_at: Utc::now(),
        };
        Ok(AgentRepository::new(self.db_pool.pool()).create(agent).await?)
    }

    pub async fn seed_meeting(&self, owner: &User, agent: &Agent) -> Result<Meeting> {
        let meeting = NewMeeting::new("Test Meeting", &owner.id, &agent.id);
        Ok(MeetingRepository::new(self.db_pool.pool())
            .insert(meeting)
            .await?)
    }
}
