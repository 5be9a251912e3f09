use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::Json;
use axum_extra::TypedHeader;
use chrono::{Datelike, Days, Duration, NaiveTime, Utc, Weekday};
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::handlers;
use appointment_cell::models::{
    AppointmentType, BookAppointmentRequest, CancelAppointmentRequest, ConsultationMode,
};
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, MockClinicResponses, TestConfig, TestUser};

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

/// 09:00 UTC on a Monday at least a week out, aligned with the mock
/// availability records (day_of_week = 1).
fn next_monday_morning() -> chrono::DateTime<Utc> {
    let mut date = Utc::now().date_naive() + Days::new(7);
    while date.weekday() != Weekday::Mon {
        date = date + Days::new(1);
    }
    date.and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap()).and_utc()
}

fn book_request(doctor_id: Uuid, start: chrono::DateTime<Utc>) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id,
        start_time: start,
        duration_minutes: Some(30),
        appointment_type: AppointmentType::GeneralConsultation,
        consultation_mode: ConsultationMode::InPerson,
        patient_notes: None,
    }
}

#[tokio::test]
async fn booking_inside_an_open_slot_succeeds() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default();
    let app_config = Arc::new(TestConfig::with_mock_server(&mock_server.uri()));

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(24));

    let doctor_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let start = next_monday_morning();
    let end = start + Duration::minutes(30);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::doctor_record(&doctor_id.to_string(), "General Practice")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::availability_record(
                &Uuid::new_v4().to_string(),
                &doctor_id.to_string(),
                1
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability_overrides"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockClinicResponses::appointment_record(
                &appointment_id.to_string(),
                &patient.id,
                &doctor_id.to_string(),
                &start.to_rfc3339(),
                &end.to_rfc3339()
            )
        ])))
        .mount(&mock_server)
        .await;

    let response = handlers::book_appointment(
        State(app_config),
        create_auth_header(&token),
        Extension(patient.to_user()),
        Json(book_request(doctor_id, start)),
    )
    .await
    .expect("booking should succeed");

    assert_eq!(response.0["id"], appointment_id.to_string());
    assert_eq!(response.0["status"], "confirmed");
}

#[tokio::test]
async fn booking_without_an_open_slot_conflicts() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default();
    let app_config = Arc::new(TestConfig::with_mock_server(&mock_server.uri()));

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(24));
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::doctor_record(&doctor_id.to_string(), "General Practice")
        ])))
        .mount(&mock_server)
        .await;

    // No schedules at all: every requested window is outside availability.
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability_overrides"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = handlers::book_appointment(
        State(app_config),
        create_auth_header(&token),
        Extension(patient.to_user()),
        Json(book_request(doctor_id, next_monday_morning())),
    )
    .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn booking_in_the_past_is_rejected() {
    let config = TestConfig::default();
    let app_config = Arc::new(config.to_app_config());

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(24));

    let result = handlers::book_appointment(
        State(app_config),
        create_auth_header(&token),
        Extension(patient.to_user()),
        Json(book_request(Uuid::new_v4(), Utc::now() - Duration::hours(1))),
    )
    .await;

    assert!(matches!(result, Err(AppError::ValidationError(_))));
}

#[tokio::test]
async fn cancelling_someone_elses_appointment_is_forbidden() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default();
    let app_config = Arc::new(TestConfig::with_mock_server(&mock_server.uri()));

    let outsider = TestUser::patient("other@example.com");
    let token = JwtTestUtils::create_test_token(&outsider, &config.jwt_secret, Some(24));

    let appointment_id = Uuid::new_v4();
    let start = next_monday_morning();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::appointment_record(
                &appointment_id.to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &start.to_rfc3339(),
                &(start + Duration::minutes(30)).to_rfc3339()
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = handlers::cancel_appointment(
        State(app_config),
        Path(appointment_id),
        create_auth_header(&token),
        Extension(outsider.to_user()),
        Json(CancelAppointmentRequest {
            reason: "Cannot make it".to_string(),
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn cancelling_a_confirmed_appointment_succeeds() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default();
    let app_config = Arc::new(TestConfig::with_mock_server(&mock_server.uri()));

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(24));

    let appointment_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let start = next_monday_morning();
    let end = start + Duration::minutes(30);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::appointment_record(
                &appointment_id.to_string(),
                &patient.id,
                &doctor_id.to_string(),
                &start.to_rfc3339(),
                &end.to_rfc3339()
            )
        ])))
        .mount(&mock_server)
        .await;

    let mut cancelled = MockClinicResponses::appointment_record(
        &appointment_id.to_string(),
        &patient.id,
        &doctor_id.to_string(),
        &start.to_rfc3339(),
        &end.to_rfc3339(),
    );
    cancelled["status"] = json!("cancelled");
    cancelled["cancellation_reason"] = json!("Cannot make it");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .mount(&mock_server)
        .await;

    let response = handlers::cancel_appointment(
        State(app_config),
        Path(appointment_id),
        create_auth_header(&token),
        Extension(patient.to_user()),
        Json(CancelAppointmentRequest {
            reason: "Cannot make it".to_string(),
        }),
    )
    .await
    .expect("cancellation should succeed");

    assert_eq!(response.0["status"], "cancelled");
}

#[tokio::test]
async fn cancelling_a_completed_appointment_conflicts() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default();
    let app_config = Arc::new(TestConfig::with_mock_server(&mock_server.uri()));

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(24));

    let appointment_id = Uuid::new_v4();
    let start = next_monday_morning();

    let mut completed = MockClinicResponses::appointment_record(
        &appointment_id.to_string(),
        &patient.id,
        &Uuid::new_v4().to_string(),
        &start.to_rfc3339(),
        &(start + Duration::minutes(30)).to_rfc3339(),
    );
    completed["status"] = json!("completed");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([completed])))
        .mount(&mock_server)
        .await;

    let result = handlers::cancel_appointment(
        State(app_config),
        Path(appointment_id),
        create_auth_header(&token),
        Extension(patient.to_user()),
        Json(CancelAppointmentRequest {
            reason: "Too late".to_string(),
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}
