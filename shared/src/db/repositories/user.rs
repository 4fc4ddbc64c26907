use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::error::DatabaseError;
use crate::models::User;
use crate::traits::UserStore;

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn create(&self, user: User) -> Result<User, DatabaseError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, created_at
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseError::ConstraintViolation("User email already exists".to_string())
            }
            _ => DatabaseError::from(e),
        })?;

        Ok(created)
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<User>, DatabaseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let users = sqlx::query_as::<_, User>(
            "SELECT id, name, email, created_at FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
