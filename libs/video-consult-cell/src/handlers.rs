use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CancelConsultationRequest, ConsultationError, CreateConsultationRequest};
use crate::services::session::SessionService;

fn map_consultation_error(e: ConsultationError) -> AppError {
    match e {
        ConsultationError::NotFound => AppError::NotFound("Consultation not found".to_string()),
        ConsultationError::NotParticipant => {
            AppError::Forbidden("Not a participant in this consultation".to_string())
        }
        ConsultationError::OutsideJoinWindow(msg) => AppError::BadRequest(msg),
        ConsultationError::InvalidTransition { from, to } => AppError::Conflict(format!(
            "Consultation cannot move from {} to {}",
            from, to
        )),
        ConsultationError::Validation(msg) => AppError::ValidationError(msg),
        ConsultationError::Database(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_consultation(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateConsultationRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let is_own_session = user.is_self(&request.doctor_id.to_string())
        || user.is_self(&request.patient_id.to_string());
    if !user.is_admin() && !is_own_session {
        return Err(AppError::Forbidden(
            "Not authorized to create this consultation".to_string(),
        ));
    }

    let session_service = SessionService::new(&state);

    let consultation = session_service
        .create_for_appointment(request, token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!(consultation)))
}

#[axum::debug_handler]
pub async fn get_for_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let session_service = SessionService::new(&state);

    let consultation = session_service
        .get_for_appointment(&appointment_id, token)
        .await
        .map_err(map_consultation_error)?
        .ok_or_else(|| AppError::NotFound("Consultation not found".to_string()))?;

    if !user.is_admin() && consultation.role_of(&user.id).is_none() {
        return Err(AppError::Forbidden(
            "Not a participant in this consultation".to_string(),
        ));
    }

    Ok(Json(json!(consultation)))
}

#[axum::debug_handler]
pub async fn list_my_consultations(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let session_service = SessionService::new(&state);

    let consultations = session_service
        .list_for_user(&user.id, token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "consultations": consultations,
        "total": consultations.len()
    })))
}

#[axum::debug_handler]
pub async fn join_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let session_service = SessionService::new(&state);

    let (consultation, grant) = session_service
        .join(&consultation_id, &user, token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "consultation": consultation,
        "grant": grant
    })))
}

#[axum::debug_handler]
pub async fn complete_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let session_service = SessionService::new(&state);

    let consultation = session_service
        .get(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;
    let is_doctor_of_record = user.is_self(&consultation.doctor_id.to_string());
    if !user.is_admin() && !is_doctor_of_record {
        return Err(AppError::Forbidden(
            "Only the consulting doctor can complete a consultation".to_string(),
        ));
    }

    let completed = session_service
        .complete(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!(completed)))
}

#[axum::debug_handler]
pub async fn cancel_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelConsultationRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let session_service = SessionService::new(&state);

    let consultation = session_service
        .get(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;
    if !user.is_admin() && consultation.role_of(&user.id).is_none() {
        return Err(AppError::Forbidden(
            "Not a participant in this consultation".to_string(),
        ));
    }

    let cancelled = session_service
        .cancel(&consultation_id, request.reason, token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!(cancelled)))
}

#[axum::debug_handler]
pub async fn sweep_no_shows(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can run the no-show sweep".to_string(),
        ));
    }

    let session_service = SessionService::new(&state);

    let swept = session_service
        .sweep_no_shows(token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({ "swept": swept })))
}
