use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    ContactStatus, EngagementError, EnquiryStatus, IngestMentionRequest, SocialChannel,
    SubmitContactRequest, SubmitEnquiryRequest, SummaryQuery, UpdateContactStatusRequest,
    UpdateEnquiryStatusRequest,
};
use crate::services::{contact::ContactService, enquiry::EnquiryService, social::SocialService};

#[derive(Debug, Deserialize)]
pub struct ContactListQuery {
    pub status: Option<ContactStatus>,
}

#[derive(Debug, Deserialize)]
pub struct EnquiryListQuery {
    pub status: Option<EnquiryStatus>,
}

#[derive(Debug, Deserialize)]
pub struct MentionListQuery {
    pub channel: Option<SocialChannel>,
    pub from_date: Option<chrono::DateTime<chrono::Utc>>,
    pub to_date: Option<chrono::DateTime<chrono::Utc>>,
}

fn map_engagement_error(e: EngagementError) -> AppError {
    match e {
        EngagementError::NotFound => AppError::NotFound("Record not found".to_string()),
        EngagementError::InvalidTransition { from, to } => {
            AppError::Conflict(format!("Cannot move from {} to {}", from, to))
        }
        EngagementError::Validation(msg) => AppError::ValidationError(msg),
        EngagementError::Database(msg) => AppError::Database(msg),
    }
}

fn require_admin(user: &User) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Administrator access required".to_string(),
        ));
    }
    Ok(())
}

// ==============================================================================
// CONTACT FORMS
// ==============================================================================

#[axum::debug_handler]
pub async fn submit_contact_form(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<SubmitContactRequest>,
) -> Result<Json<Value>, AppError> {
    let contact_service = ContactService::new(&state);

    let form = contact_service
        .submit(request)
        .await
        .map_err(map_engagement_error)?;

    Ok(Json(json!(form)))
}

#[axum::debug_handler]
pub async fn list_contact_forms(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ContactListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let contact_service = ContactService::new(&state);

    let forms = contact_service
        .list(query.status, token)
        .await
        .map_err(map_engagement_error)?;

    Ok(Json(json!({
        "contact_forms": forms,
        "total": forms.len()
    })))
}

#[axum::debug_handler]
pub async fn update_contact_status(
    State(state): State<Arc<AppConfig>>,
    Path(form_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateContactStatusRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let contact_service = ContactService::new(&state);

    let updated = contact_service
        .update_status(&form_id, request.status, token)
        .await
        .map_err(map_engagement_error)?;

    Ok(Json(json!(updated)))
}

// ==============================================================================
// ENQUIRIES
// ==============================================================================

#[axum::debug_handler]
pub async fn submit_enquiry(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<SubmitEnquiryRequest>,
) -> Result<Json<Value>, AppError> {
    let enquiry_service = EnquiryService::new(&state);

    // Public channel; enquiries from logged-in patients go through the
    // authenticated route below.
    let enquiry = enquiry_service
        .submit(None, request)
        .await
        .map_err(map_engagement_error)?;

    Ok(Json(json!(enquiry)))
}

#[axum::debug_handler]
pub async fn submit_patient_enquiry(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<SubmitEnquiryRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid patient ID".to_string()))?;

    let enquiry_service = EnquiryService::new(&state);

    let enquiry = enquiry_service
        .submit(Some(patient_id), request)
        .await
        .map_err(map_engagement_error)?;

    Ok(Json(json!(enquiry)))
}

#[axum::debug_handler]
pub async fn list_enquiries(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<EnquiryListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let enquiry_service = EnquiryService::new(&state);

    let enquiries = enquiry_service
        .list(query.status, token)
        .await
        .map_err(map_engagement_error)?;

    Ok(Json(json!({
        "enquiries": enquiries,
        "total": enquiries.len()
    })))
}

#[axum::debug_handler]
pub async fn update_enquiry_status(
    State(state): State<Arc<AppConfig>>,
    Path(enquiry_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateEnquiryStatusRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let enquiry_service = EnquiryService::new(&state);

    let updated = enquiry_service
        .update_status(&enquiry_id, request.status, token)
        .await
        .map_err(map_engagement_error)?;

    Ok(Json(json!(updated)))
}

// ==============================================================================
// SOCIAL MENTIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn ingest_mention(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<IngestMentionRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let social_service = SocialService::new(&state);

    let mention = social_service
        .ingest_mention(request, token)
        .await
        .map_err(map_engagement_error)?;

    Ok(Json(json!(mention)))
}

#[axum::debug_handler]
pub async fn list_mentions(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<MentionListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let social_service = SocialService::new(&state);

    let summary_query = SummaryQuery {
        from_date: query.from_date,
        to_date: query.to_date,
    };
    let mentions = social_service
        .list_mentions(query.channel, &summary_query, token)
        .await
        .map_err(map_engagement_error)?;

    Ok(Json(json!({
        "mentions": mentions,
        "total": mentions.len()
    })))
}

#[axum::debug_handler]
pub async fn channel_summary(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SummaryQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let token = auth.token();

    let social_service = SocialService::new(&state);

    let summaries = social_service
        .channel_summary(&query, token)
        .await
        .map_err(map_engagement_error)?;

    Ok(Json(json!({
        "channels": summaries,
        "total": summaries.len()
    })))
}
