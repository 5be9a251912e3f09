use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: String,
    pub sub_specialty: Option<String>,
    pub bio: Option<String>,
    pub license_number: String,
    pub years_experience: Option<i32>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub timezone: Option<String>,
    pub clinic_latitude: Option<f64>,
    pub clinic_longitude: Option<f64>,
    pub is_verified: bool,
    pub is_accepting_patients: bool,
    pub rating: f32,
    pub total_consultations: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn speaks(&self, language: &str) -> bool {
        self.languages
            .iter()
            .any(|l| l.eq_ignore_ascii_case(language))
    }
}

/// Weekly recurring consultation window for a doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAvailability {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: i32, // 0 = Sunday, 1 = Monday, etc.
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: i32,
    pub buffer_minutes: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Date-specific exception to the weekly schedule (public holiday, leave).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityOverride {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub override_date: NaiveDate,
    pub is_open: bool,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorSearchFilters {
    pub specialty: Option<String>,
    pub min_rating: Option<f32>,
    pub min_experience: Option<i32>,
    pub language: Option<String>,
    pub verified_only: Option<bool>,
    pub accepting_only: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: String,
    pub sub_specialty: Option<String>,
    pub bio: Option<String>,
    pub license_number: String,
    pub years_experience: Option<i32>,
    pub languages: Option<Vec<String>>,
    pub timezone: Option<String>,
    pub clinic_latitude: Option<f64>,
    pub clinic_longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub specialty: Option<String>,
    pub sub_specialty: Option<String>,
    pub years_experience: Option<i32>,
    pub languages: Option<Vec<String>>,
    pub timezone: Option<String>,
    pub clinic_latitude: Option<f64>,
    pub clinic_longitude: Option<f64>,
    pub is_accepting_patients: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: i32,
    pub buffer_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub slot_minutes: Option<i32>,
    pub buffer_minutes: Option<i32>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOverrideRequest {
    pub override_date: NaiveDate,
    pub is_open: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub patient_id: Uuid,
    pub specialty: Option<String>,
    pub preferred_date: Option<NaiveDate>,
    pub patient_latitude: Option<f64>,
    pub patient_longitude: Option<f64>,
    #[serde(default)]
    pub preferred_languages: Vec<String>,
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorRecommendation {
    pub doctor: Doctor,
    pub score: f32, // 0.0 to 1.0, higher is better
    pub reasons: Vec<String>,
    pub available_slots: Vec<AvailableSlot>,
}

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("No verified {0} doctors are currently available")]
    NoSpecialtyCoverage(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Schedule conflicts with an existing availability window")]
    ScheduleConflict,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}
