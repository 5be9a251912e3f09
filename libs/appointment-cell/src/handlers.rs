use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, AppointmentSearchQuery, BookAppointmentRequest, CancelAppointmentRequest,
    RescheduleAppointmentRequest,
};
use crate::services::booking::BookingService;

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::SlotUnavailable => AppError::Conflict(
            "Requested time is outside the doctor's available slots".to_string(),
        ),
        AppointmentError::Overlap(msg) => AppError::Conflict(msg),
        AppointmentError::InvalidTransition { from, to } => AppError::Conflict(format!(
            "Appointment cannot move from {} to {}",
            from, to
        )),
        AppointmentError::Validation(msg) => AppError::ValidationError(msg),
        AppointmentError::Database(msg) => AppError::Database(msg),
    }
}

fn parse_user_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let patient_id = parse_user_uuid(&user)?;

    let booking_service = BookingService::new(&state);

    let appointment = booking_service
        .book_appointment(patient_id, request, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let appointment = booking_service
        .get_appointment(&appointment_id, token)
        .await
        .map_err(map_appointment_error)?;

    if !user.is_admin() && !appointment.involves(&user.id) {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_my_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AppointmentSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let appointments = booking_service
        .list_for_patient(&user.id, query, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<AppointmentSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() && !user.is_self(&doctor_id) {
        return Err(AppError::Forbidden(
            "Not authorized to view this doctor's schedule".to_string(),
        ));
    }

    let booking_service = BookingService::new(&state);

    let appointments = booking_service
        .list_for_doctor(&doctor_id, query, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let current = booking_service
        .get_appointment(&appointment_id, token)
        .await
        .map_err(map_appointment_error)?;
    if !user.is_admin() && !current.involves(&user.id) {
        return Err(AppError::Forbidden(
            "Not authorized to reschedule this appointment".to_string(),
        ));
    }

    let successor = booking_service
        .reschedule(&appointment_id, request, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(successor)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if request.reason.trim().is_empty() {
        return Err(AppError::ValidationError(
            "A cancellation reason is required".to_string(),
        ));
    }

    let booking_service = BookingService::new(&state);

    let current = booking_service
        .get_appointment(&appointment_id, token)
        .await
        .map_err(map_appointment_error)?;
    if !user.is_admin() && !current.involves(&user.id) {
        return Err(AppError::Forbidden(
            "Not authorized to cancel this appointment".to_string(),
        ));
    }

    let cancelled = booking_service
        .cancel(&appointment_id, request, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(cancelled)))
}
