use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum_extra::TypedHeader;
use chrono::{Duration, Utc};
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use video_consult_cell::handlers;

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

fn consultation_json(
    id: &Uuid,
    patient_id: &str,
    doctor_id: &str,
    start_offset_minutes: i64,
    end_offset_minutes: i64,
    status: &str,
) -> serde_json::Value {
    json!({
        "id": id,
        "appointment_id": Uuid::new_v4(),
        "patient_id": patient_id,
        "doctor_id": doctor_id,
        "scheduled_start": (Utc::now() + Duration::minutes(start_offset_minutes)).to_rfc3339(),
        "scheduled_end": (Utc::now() + Duration::minutes(end_offset_minutes)).to_rfc3339(),
        "status": status,
        "room_name": format!("consult-{}", id),
        "started_at": null,
        "ended_at": null,
        "end_reason": null,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn join_before_window_opens_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default();
    let app_config = Arc::new(TestConfig::with_mock_server(&mock_server.uri()));

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(24));
    let consultation_id = Uuid::new_v4();

    // Opens in two hours; the 15 minute lead has not started.
    Mock::given(method("GET"))
        .and(path("/rest/v1/video_consultations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([consultation_json(
            &consultation_id,
            &patient.id,
            &Uuid::new_v4().to_string(),
            120,
            150,
            "scheduled"
        )])))
        .mount(&mock_server)
        .await;

    let result = handlers::join_consultation(
        State(app_config),
        Path(consultation_id),
        create_auth_header(&token),
        Extension(patient.to_user()),
    )
    .await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn patient_join_opens_waiting_room() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default();
    let app_config = Arc::new(TestConfig::with_mock_server(&mock_server.uri()));

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(24));
    let consultation_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4().to_string();

    // Starts in five minutes, inside the join lead.
    Mock::given(method("GET"))
        .and(path("/rest/v1/video_consultations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([consultation_json(
            &consultation_id,
            &patient.id,
            &doctor_id,
            5,
            35,
            "scheduled"
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/video_consultations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([consultation_json(
            &consultation_id,
            &patient.id,
            &doctor_id,
            5,
            35,
            "waiting_room"
        )])))
        .mount(&mock_server)
        .await;

    let response = handlers::join_consultation(
        State(app_config),
        Path(consultation_id),
        create_auth_header(&token),
        Extension(patient.to_user()),
    )
    .await
    .expect("patient join should succeed");

    assert_eq!(response.0["consultation"]["status"], "waiting_room");
    assert_eq!(response.0["grant"]["role"], "patient");
    assert!(response.0["grant"]["token"].as_str().unwrap().contains('.'));
}

#[tokio::test]
async fn doctor_join_starts_the_session() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default();
    let app_config = Arc::new(TestConfig::with_mock_server(&mock_server.uri()));

    let doctor = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(24));
    let consultation_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/video_consultations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([consultation_json(
            &consultation_id,
            &patient_id,
            &doctor.id,
            -5,
            25,
            "waiting_room"
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/video_consultations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([consultation_json(
            &consultation_id,
            &patient_id,
            &doctor.id,
            -5,
            25,
            "in_progress"
        )])))
        .mount(&mock_server)
        .await;

    let response = handlers::join_consultation(
        State(app_config),
        Path(consultation_id),
        create_auth_header(&token),
        Extension(doctor.to_user()),
    )
    .await
    .expect("doctor join should succeed");

    assert_eq!(response.0["consultation"]["status"], "in_progress");
    assert_eq!(response.0["grant"]["role"], "doctor");
}

#[tokio::test]
async fn outsiders_cannot_join() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default();
    let app_config = Arc::new(TestConfig::with_mock_server(&mock_server.uri()));

    let outsider = TestUser::patient("other@example.com");
    let token = JwtTestUtils::create_test_token(&outsider, &config.jwt_secret, Some(24));
    let consultation_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/video_consultations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([consultation_json(
            &consultation_id,
            &Uuid::new_v4().to_string(),
            &Uuid::new_v4().to_string(),
            5,
            35,
            "scheduled"
        )])))
        .mount(&mock_server)
        .await;

    let result = handlers::join_consultation(
        State(app_config),
        Path(consultation_id),
        create_auth_header(&token),
        Extension(outsider.to_user()),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn completed_sessions_reject_joins() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default();
    let app_config = Arc::new(TestConfig::with_mock_server(&mock_server.uri()));

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(24));
    let consultation_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/video_consultations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([consultation_json(
            &consultation_id,
            &patient.id,
            &Uuid::new_v4().to_string(),
            -60,
            -30,
            "completed"
        )])))
        .mount(&mock_server)
        .await;

    let result = handlers::join_consultation(
        State(app_config),
        Path(consultation_id),
        create_auth_header(&token),
        Extension(patient.to_user()),
    )
    .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}
