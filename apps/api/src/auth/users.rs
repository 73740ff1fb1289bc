use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::google::ExternalIdentity;
use crate::errors::AppError;
use crate::models::user::User;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates the user on first login; later logins refresh email, name
    /// and picture from the provider.
    async fn upsert_identity(&self, identity: &ExternalIdentity) -> Result<User, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn upsert_identity(&self, identity: &ExternalIdentity) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (google_id, email, name, picture)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (google_id) DO UPDATE
                SET email = EXCLUDED.email,
                    name = EXCLUDED.name,
                    picture = EXCLUDED.picture,
                    updated_at = now()
            RETURNING *
            "#,
        )
        .bind(&identity.provider_id)
        .bind(&identity.email)
        .bind(&identity.name)
        .bind(&identity.picture)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }
}
