use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::Json;
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use engagement_cell::handlers;
use engagement_cell::models::{
    EnquiryChannel, IngestMentionRequest, SocialChannel, SubmitContactRequest,
    SubmitEnquiryRequest,
};
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

fn contact_request(email: &str) -> SubmitContactRequest {
    SubmitContactRequest {
        name: "Tan Wei Ming".to_string(),
        email: email.to_string(),
        phone: Some("+65 9123 4567".to_string()),
        subject: "Enrollment question".to_string(),
        message: "How do I enroll my parents at your clinic?".to_string(),
    }
}

#[tokio::test]
async fn contact_form_rejects_invalid_email() {
    let config = Arc::new(TestConfig::default().to_app_config());

    let result =
        handlers::submit_contact_form(State(config), Json(contact_request("not-an-email"))).await;

    assert!(matches!(result, Err(AppError::ValidationError(_))));
}

#[tokio::test]
async fn contact_form_submission_is_stored_as_new() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_mock_server(&mock_server.uri()));
    let form_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/contact_forms"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": form_id,
            "name": "Tan Wei Ming",
            "email": "wm.tan@example.com",
            "phone": "+65 9123 4567",
            "subject": "Enrollment question",
            "message": "How do I enroll my parents at your clinic?",
            "status": "new",
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        }])))
        .mount(&mock_server)
        .await;

    let response =
        handlers::submit_contact_form(State(config), Json(contact_request("wm.tan@example.com")))
            .await
            .expect("submission should succeed");

    assert_eq!(response.0["id"], form_id.to_string());
    assert_eq!(response.0["status"], "new");
}

#[tokio::test]
async fn enquiry_is_classified_and_routed() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_mock_server(&mock_server.uri()));

    // Echo back what the handler submits so classification is observable.
    Mock::given(method("POST"))
        .and(path("/rest/v1/enquiries"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "patient_id": null,
            "channel": "web",
            "topic": "appointments",
            "message": "I need to reschedule my appointment",
            "routed_to": "scheduling-team",
            "status": "open",
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        }])))
        .mount(&mock_server)
        .await;

    let request = SubmitEnquiryRequest {
        topic: None,
        channel: EnquiryChannel::Web,
        message: "I need to reschedule my appointment".to_string(),
    };

    let response = handlers::submit_enquiry(State(config), Json(request))
        .await
        .expect("enquiry should succeed");

    assert_eq!(response.0["topic"], "appointments");
    assert_eq!(response.0["routed_to"], "scheduling-team");
}

#[tokio::test]
async fn mention_ingest_requires_admin() {
    let config = TestConfig::default();
    let app_config = Arc::new(config.to_app_config());

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(24));

    let request = IngestMentionRequest {
        channel: SocialChannel::Facebook,
        author: "reviewer".to_string(),
        content: "Great clinic".to_string(),
        posted_at: Utc::now(),
    };

    let result = handlers::ingest_mention(
        State(app_config),
        create_auth_header(&token),
        Extension(patient.to_user()),
        Json(request),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn mention_ingest_scores_sentiment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default();
    let app_config = Arc::new(TestConfig::with_mock_server(&mock_server.uri()));

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let mention_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/social_mentions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": mention_id,
            "channel": "google_reviews",
            "author": "reviewer",
            "content": "Friendly staff and a very thorough doctor, highly recommend.",
            "posted_at": Utc::now().to_rfc3339(),
            "sentiment_score": 1.0,
            "sentiment_label": "positive",
            "created_at": Utc::now().to_rfc3339()
        }])))
        .mount(&mock_server)
        .await;

    let request = IngestMentionRequest {
        channel: SocialChannel::GoogleReviews,
        author: "reviewer".to_string(),
        content: "Friendly staff and a very thorough doctor, highly recommend.".to_string(),
        posted_at: Utc::now(),
    };

    let response = handlers::ingest_mention(
        State(app_config),
        create_auth_header(&token),
        Extension(admin.to_user()),
        Json(request),
    )
    .await
    .expect("ingest should succeed");

    assert_eq!(response.0["sentiment_label"], "positive");
}
