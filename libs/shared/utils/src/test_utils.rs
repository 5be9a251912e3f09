use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub video_token_secret: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            video_token_secret: "test-video-room-token-secret".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            redis_url: None,
            clinic_latitude: 1.3521,
            clinic_longitude: 103.8198,
            waitlist_offer_ttl_minutes: 120,
            video_join_lead_minutes: 15,
            video_token_secret: self.video_token_secret.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }

    /// Config pointing at a wiremock server instead of the default URL.
    pub fn with_mock_server(uri: &str) -> AppConfig {
        let mut config = TestConfig::default().to_app_config();
        config.supabase_url = uri.to_string();
        config
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let claims = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("test token encoding should not fail")
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-2))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows for wiremock fixtures.
pub struct MockClinicResponses;

impl MockClinicResponses {
    pub fn doctor_record(id: &str, specialty: &str) -> serde_json::Value {
        json!({
            "id": id,
            "first_name": "Aisha",
            "last_name": "Rahman",
            "email": "aisha.rahman@example.com",
            "specialty": specialty,
            "sub_specialty": null,
            "bio": "Family physician",
            "license_number": "M04512A",
            "years_experience": 8,
            "languages": ["English", "Malay"],
            "timezone": "Asia/Singapore",
            "clinic_latitude": 1.3521,
            "clinic_longitude": 103.8198,
            "is_verified": true,
            "is_accepting_patients": true,
            "rating": 4.6,
            "total_consultations": 230,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn availability_record(id: &str, doctor_id: &str, day_of_week: i32) -> serde_json::Value {
        json!({
            "id": id,
            "doctor_id": doctor_id,
            "day_of_week": day_of_week,
            "start_time": "09:00:00",
            "end_time": "12:00:00",
            "slot_minutes": 30,
            "buffer_minutes": 0,
            "is_available": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_record(
        id: &str,
        patient_id: &str,
        doctor_id: &str,
        start_time: &str,
        end_time: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "start_time": start_time,
            "end_time": end_time,
            "appointment_type": "general_consultation",
            "consultation_mode": "in_person",
            "status": "confirmed",
            "patient_notes": null,
            "doctor_notes": null,
            "cancellation_reason": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn consultation_record(
        id: &str,
        appointment_id: &str,
        patient_id: &str,
        doctor_id: &str,
        scheduled_start: &str,
        scheduled_end: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "appointment_id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "scheduled_start": scheduled_start,
            "scheduled_end": scheduled_end,
            "status": status,
            "room_name": format!("consult-{}", id),
            "started_at": null,
            "ended_at": null,
            "end_reason": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::validate_token;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
        assert!(app_config.redis_url.is_none());
    }

    #[test]
    fn test_token_round_trip() {
        let config = TestConfig::default();
        let test_user = TestUser::doctor("doc@example.com");
        let token = JwtTestUtils::create_test_token(&test_user, &config.jwt_secret, Some(1));

        let user = validate_token(&token, &config.jwt_secret).expect("token should validate");
        assert_eq!(user.id, test_user.id);
        assert_eq!(user.email, Some(test_user.email.clone()));
        assert_eq!(user.role, Some("doctor".to_string()));
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = TestConfig::default();
        let test_user = TestUser::default();
        let token = JwtTestUtils::create_expired_token(&test_user, &config.jwt_secret);

        let err = validate_token(&token, &config.jwt_secret).unwrap_err();
        assert_eq!(err, "Token expired");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let config = TestConfig::default();
        let test_user = TestUser::default();
        let token = JwtTestUtils::create_invalid_signature_token(&test_user);

        let err = validate_token(&token, &config.jwt_secret).unwrap_err();
        assert_eq!(err, "Invalid token signature");
    }

    #[test]
    fn test_empty_secret_rejected() {
        let test_user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&test_user, "some-secret", Some(1));

        assert!(validate_token(&token, "").is_err());
    }
}
