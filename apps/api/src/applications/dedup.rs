//! Duplicate guard for (company, job title) pairs.
//!
//! The pre-check exists so the client gets the conflicting record back.
//! The unique index behind `ApplicationStore::insert` / `update` is what
//! actually settles concurrent identical submissions.

use tracing::{debug, info};
use uuid::Uuid;

use crate::applications::store::ApplicationStore;
use crate::errors::AppError;
use crate::models::application::{Application, ApplicationPatch, NewApplication};

/// Looks up an existing record owned by `user_id` for the same pair, trimmed
/// and compared case-insensitively. Case folding is left to the store so the
/// lookup and the unique index cannot disagree.
pub async fn check_duplicate(
    store: &dyn ApplicationStore,
    user_id: Uuid,
    company: &str,
    title: &str,
) -> Result<Option<Application>, AppError> {
    store
        .find_by_pair(user_id, company.trim(), title.trim())
        .await
}

/// Creates an application unless the user already tracks the same pair.
pub async fn create_guarded(
    store: &dyn ApplicationStore,
    user_id: Uuid,
    new: &NewApplication,
) -> Result<Application, AppError> {
    if let Some(existing) = check_duplicate(store, user_id, &new.company_name, &new.job_title).await? {
        debug!("Duplicate pre-check hit for user {user_id}: application {}", existing.id);
        return Err(AppError::Duplicate(Some(Box::new(existing))));
    }

    match store.insert(user_id, new).await {
        Ok(created) => {
            info!("Created application {} for user {user_id}", created.id);
            Ok(created)
        }
        Err(AppError::Duplicate(_)) => {
            // Lost a race against a concurrent create for the same pair.
            info!("Unique index rejected concurrent create for user {user_id}");
            let existing =
                check_duplicate(store, user_id, &new.company_name, &new.job_title).await?;
            Err(AppError::Duplicate(existing.map(Box::new)))
        }
        Err(e) => Err(e),
    }
}

/// Applies a partial update. Renaming a record onto a pair another record
/// already holds is rejected with the duplicate contract.
pub async fn update_guarded(
    store: &dyn ApplicationStore,
    user_id: Uuid,
    id: Uuid,
    patch: &ApplicationPatch,
) -> Result<Application, AppError> {
    let current = store
        .get(user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;

    if patch.touches_identity() {
        let company = patch.company_name.as_deref().unwrap_or(&current.company_name);
        let title = patch.job_title.as_deref().unwrap_or(&current.job_title);
        if let Some(existing) = check_duplicate(store, user_id, company, title).await? {
            if existing.id != id {
                return Err(AppError::Duplicate(Some(Box::new(existing))));
            }
        }
    }

    let updated = store.update(user_id, id, patch).await?;
    updated.ok_or_else(|| AppError::NotFound("Application not found".to_string()))
}
