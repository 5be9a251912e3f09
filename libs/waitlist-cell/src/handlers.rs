use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::error::WaitlistError;
use crate::models::JoinWaitlistRequest;
use crate::services::store::WaitlistStore;

fn map_waitlist_error(e: WaitlistError) -> AppError {
    match e {
        WaitlistError::NotConfigured => {
            AppError::Internal("Waitlist is not available".to_string())
        }
        WaitlistError::NotFound(id) => {
            AppError::NotFound(format!("Waitlist entry not found: {}", id))
        }
        WaitlistError::DuplicateEntry(specialty) => AppError::Conflict(format!(
            "An active {} waitlist entry already exists",
            specialty
        )),
        WaitlistError::InvalidTransition { from, to } => AppError::Conflict(format!(
            "Waitlist entry cannot move from {} to {}",
            from, to
        )),
        WaitlistError::OfferLapsed(msg) => AppError::Conflict(msg),
        WaitlistError::Validation(msg) => AppError::ValidationError(msg),
        other => {
            error!("Waitlist backend error: {}", other);
            AppError::Internal("Waitlist operation failed".to_string())
        }
    }
}

async fn open_store(config: &AppConfig) -> Result<WaitlistStore, AppError> {
    WaitlistStore::new(config).await.map_err(map_waitlist_error)
}

fn parse_user_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}

#[axum::debug_handler]
pub async fn join_waitlist(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<JoinWaitlistRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = parse_user_uuid(&user)?;
    let store = open_store(&state).await?;

    let entry = store
        .join(patient_id, request)
        .await
        .map_err(map_waitlist_error)?;

    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn list_my_entries(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let store = open_store(&state).await?;

    let entries = store
        .list_for_patient(&user.id)
        .await
        .map_err(map_waitlist_error)?;

    Ok(Json(json!({
        "entries": entries,
        "total": entries.len()
    })))
}

#[axum::debug_handler]
pub async fn get_entry(
    State(state): State<Arc<AppConfig>>,
    Path(entry_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let store = open_store(&state).await?;

    let entry = store
        .get(&entry_id)
        .await
        .map_err(map_waitlist_error)?
        .ok_or_else(|| AppError::NotFound(format!("Waitlist entry not found: {}", entry_id)))?;

    if !user.is_admin() && entry.patient_id.to_string() != user.id {
        return Err(AppError::Forbidden(
            "Not authorized to view this waitlist entry".to_string(),
        ));
    }

    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn cancel_entry(
    State(state): State<Arc<AppConfig>>,
    Path(entry_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let store = open_store(&state).await?;

    let entry = store
        .cancel(&entry_id, &user.id)
        .await
        .map_err(map_waitlist_error)?;

    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn accept_offer(
    State(state): State<Arc<AppConfig>>,
    Path(entry_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let store = open_store(&state).await?;

    let entry = store
        .accept_offer(&entry_id, &user.id)
        .await
        .map_err(map_waitlist_error)?;

    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn get_stats(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can view waitlist statistics".to_string(),
        ));
    }

    let store = open_store(&state).await?;
    let stats = store.stats().await;

    Ok(Json(json!(stats)))
}
