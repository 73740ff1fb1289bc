use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::application::{Application, ApplicationPatch, ApplicationRow, NewApplication};

/// Persistence for application records. Every operation is scoped to the
/// owning user: a record belonging to someone else behaves as if absent.
///
/// Carried in `AppState` as `Arc<dyn ApplicationStore>`.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// All of the user's records, newest `date_applied` first.
    async fn list(&self, user_id: Uuid) -> Result<Vec<Application>, AppError>;

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Application>, AppError>;

    /// Case-insensitive match on trimmed company and title, folded the same
    /// way as the store's uniqueness rule.
    async fn find_by_pair(
        &self,
        user_id: Uuid,
        company: &str,
        title: &str,
    ) -> Result<Option<Application>, AppError>;

    /// Fails with `AppError::Duplicate(None)` when the unique index rejects the row.
    async fn insert(&self, user_id: Uuid, new: &NewApplication) -> Result<Application, AppError>;

    /// Returns `None` when no record with that id is owned by the user.
    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &ApplicationPatch,
    ) -> Result<Option<Application>, AppError>;

    /// Returns whether a record was removed.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError>;
}

/// PostgreSQL-backed store. The `applications_user_pair_key` unique index
/// is the authoritative duplicate check; `find_by_pair` repeats its key
/// expressions so both fold case identically.
#[derive(Clone)]
pub struct PgApplicationStore {
    pool: PgPool,
}

impl PgApplicationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const FIND_BY_PAIR_SQL: &str = r#"
    SELECT * FROM applications
    WHERE user_id = $1
      AND lower(btrim(company_name) COLLATE "und-x-icu") = lower(btrim($2) COLLATE "und-x-icu")
      AND lower(btrim(job_title) COLLATE "und-x-icu") = lower(btrim($3) COLLATE "und-x-icu")
    LIMIT 1
"#;

fn into_model(row: ApplicationRow) -> Result<Application, AppError> {
    Application::try_from(row).map_err(AppError::Internal)
}

/// Translates a unique-index violation into the duplicate contract.
fn map_unique_violation(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Duplicate(None),
        _ => AppError::Database(err),
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn list(&self, user_id: Uuid) -> Result<Vec<Application>, AppError> {
        let rows = sqlx::query_as::<_, ApplicationRow>(
            r#"
            SELECT * FROM applications
            WHERE user_id = $1
            ORDER BY date_applied DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_model).collect()
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Application>, AppError> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            "SELECT * FROM applications WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_model).transpose()
    }

    async fn find_by_pair(
        &self,
        user_id: Uuid,
        company: &str,
        title: &str,
    ) -> Result<Option<Application>, AppError> {
        let row = sqlx::query_as::<_, ApplicationRow>(FIND_BY_PAIR_SQL)
            .bind(user_id)
            .bind(company)
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;

        row.map(into_model).transpose()
    }

    async fn insert(&self, user_id: Uuid, new: &NewApplication) -> Result<Application, AppError> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            r#"
            INSERT INTO applications
                (id, user_id, company_name, job_title, location, url,
                 date_applied, source, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, now()), $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&new.company_name)
        .bind(&new.job_title)
        .bind(&new.location)
        .bind(&new.url)
        .bind(new.date_applied)
        .bind(new.source.as_str())
        .bind(new.status.as_str())
        .bind(&new.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        into_model(row)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &ApplicationPatch,
    ) -> Result<Option<Application>, AppError> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            r#"
            UPDATE applications SET
                company_name = COALESCE($3, company_name),
                job_title    = COALESCE($4, job_title),
                location     = COALESCE($5, location),
                url          = COALESCE($6, url),
                date_applied = COALESCE($7, date_applied),
                source       = COALESCE($8, source),
                status       = COALESCE($9, status),
                notes        = COALESCE($10, notes),
                updated_at   = clock_timestamp()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(patch.company_name.as_deref())
        .bind(patch.job_title.as_deref())
        .bind(patch.location.as_deref())
        .bind(patch.url.as_deref())
        .bind(patch.date_applied)
        .bind(patch.source.map(|s| s.as_str()))
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.notes.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        row.map(into_model).transpose()
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM applications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
