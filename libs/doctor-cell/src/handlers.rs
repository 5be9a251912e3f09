use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateAvailabilityRequest, CreateDoctorRequest, CreateOverrideRequest, DoctorError,
    DoctorSearchFilters, RecommendationRequest, SlotQuery, UpdateAvailabilityRequest,
    UpdateDoctorRequest,
};
use crate::services::{
    availability::AvailabilityService, doctor::DoctorService, recommendation::RecommendationService,
};

#[derive(Debug, Deserialize)]
pub struct DoctorSearchQuery {
    pub specialty: Option<String>,
    pub min_rating: Option<f32>,
    pub min_experience: Option<i32>,
    pub language: Option<String>,
    pub verified_only: Option<bool>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct SlotQueryParams {
    pub date: NaiveDate,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationBody {
    pub specialty: Option<String>,
    pub preferred_date: Option<NaiveDate>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub preferred_languages: Option<Vec<String>>,
    pub max_results: Option<usize>,
}

fn map_doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::NoSpecialtyCoverage(specialty) => {
            AppError::NotFound(format!("No {} doctors available at this time", specialty))
        }
        DoctorError::InvalidSchedule(msg) => AppError::BadRequest(msg),
        DoctorError::ScheduleConflict => {
            AppError::Conflict("Availability conflicts with an existing schedule".to_string())
        }
        DoctorError::Validation(msg) => AppError::ValidationError(msg),
        DoctorError::Database(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn search_doctors_public(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let filters = DoctorSearchFilters {
        specialty: query.specialty,
        min_rating: query.min_rating,
        min_experience: query.min_experience,
        language: query.language,
        // Public searches only surface verified, accepting doctors.
        verified_only: Some(query.verified_only.unwrap_or(true)),
        accepting_only: Some(true),
    };

    let doctors = doctor_service
        .search_doctors(filters, None, query.limit, query.offset)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_public(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service
        .get_doctor(&doctor_id, None)
        .await
        .map_err(|_| AppError::NotFound("Doctor not found".to_string()))?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_available_slots_public(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<SlotQueryParams>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let slots = availability_service
        .get_available_slots(
            &doctor_id,
            SlotQuery {
                date: query.date,
                duration_minutes: query.duration_minutes,
            },
            None,
        )
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "available_slots": slots,
        "total_slots": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn list_availability_public(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let schedules = availability_service
        .list_for_doctor(&doctor_id, None)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "schedules": schedules
    })))
}

// ==============================================================================
// PROTECTED DOCTOR PROFILE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can create doctor profiles".to_string(),
        ));
    }

    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service
        .create_doctor(request, token)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() && !user.is_self(&doctor_id) {
        return Err(AppError::Forbidden(
            "Not authorized to update this doctor profile".to_string(),
        ));
    }

    let doctor_service = DoctorService::new(&state);

    let updated = doctor_service
        .update_doctor(&doctor_id, request, token)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(updated)))
}

#[axum::debug_handler]
pub async fn verify_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can verify doctors".to_string(),
        ));
    }

    let is_verified = payload["is_verified"]
        .as_bool()
        .ok_or_else(|| AppError::BadRequest("is_verified field is required".to_string()))?;

    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service
        .verify_doctor(&doctor_id, is_verified, token)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(doctor)))
}

// ==============================================================================
// AVAILABILITY HANDLERS (Doctor Configuration)
// ==============================================================================

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() && !user.is_self(&doctor_id) {
        return Err(AppError::Forbidden(
            "Not authorized to manage availability for this doctor".to_string(),
        ));
    }

    let availability_service = AvailabilityService::new(&state);

    let schedule = availability_service
        .create_schedule(&doctor_id, request, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_id, availability_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() && !user.is_self(&doctor_id) {
        return Err(AppError::Forbidden(
            "Not authorized to manage availability for this doctor".to_string(),
        ));
    }

    let availability_service = AvailabilityService::new(&state);

    let updated = availability_service
        .update_schedule(&availability_id, request, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(updated)))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_id, availability_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() && !user.is_self(&doctor_id) {
        return Err(AppError::Forbidden(
            "Not authorized to manage availability for this doctor".to_string(),
        ));
    }

    let availability_service = AvailabilityService::new(&state);

    availability_service
        .delete_schedule(&availability_id, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn create_availability_override(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateOverrideRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() && !user.is_self(&doctor_id) {
        return Err(AppError::Forbidden(
            "Not authorized to manage availability for this doctor".to_string(),
        ));
    }

    let availability_service = AvailabilityService::new(&state);

    let entry = availability_service
        .create_override(&doctor_id, request, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(entry)))
}

// ==============================================================================
// RECOMMENDATION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn recommend_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(body): Json<RecommendationBody>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let patient_id = uuid::Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid patient ID".to_string()))?;

    let request = RecommendationRequest {
        patient_id,
        specialty: body.specialty,
        preferred_date: body.preferred_date,
        patient_latitude: body.latitude,
        patient_longitude: body.longitude,
        preferred_languages: body.preferred_languages.unwrap_or_default(),
        max_results: body.max_results,
    };

    let service = RecommendationService::new(&state);

    let recommendations = service
        .recommend_doctors(request, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "recommendations": recommendations,
        "total": recommendations.len()
    })))
}

#[axum::debug_handler]
pub async fn best_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(body): Json<RecommendationBody>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let patient_id = uuid::Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid patient ID".to_string()))?;

    let request = RecommendationRequest {
        patient_id,
        specialty: body.specialty,
        preferred_date: body.preferred_date,
        patient_latitude: body.latitude,
        patient_longitude: body.longitude,
        preferred_languages: body.preferred_languages.unwrap_or_default(),
        max_results: Some(1),
    };

    let service = RecommendationService::new(&state);

    let best = service
        .best_doctor(request, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({ "best_match": best })))
}
