use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateDoctorRequest, Doctor, DoctorSearchFilters, UpdateDoctorRequest};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor> {
        debug!("Creating doctor profile for {}", request.email);

        if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
            return Err(anyhow!("Doctor name must not be empty"));
        }
        if request.license_number.trim().is_empty() {
            return Err(anyhow!("License number is required"));
        }

        let doctor_data = json!({
            "first_name": request.first_name,
            "last_name": request.last_name,
            "email": request.email,
            "specialty": request.specialty,
            "sub_specialty": request.sub_specialty,
            "bio": request.bio,
            "license_number": request.license_number,
            "years_experience": request.years_experience,
            "languages": request.languages.unwrap_or_default(),
            "timezone": request.timezone,
            "clinic_latitude": request.clinic_latitude,
            "clinic_longitude": request.clinic_longitude,
            "is_verified": false,
            "is_accepting_patients": true,
            "rating": 0.0,
            "total_consultations": 0,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let doctor: Doctor = self
            .supabase
            .insert_returning("/rest/v1/doctors", Some(auth_token), doctor_data)
            .await?;

        debug!("Doctor created with ID: {}", doctor.id);
        Ok(doctor)
    }

    pub async fn get_doctor(&self, doctor_id: &str, auth_token: Option<&str>) -> Result<Doctor> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;

        let row = rows.into_iter().next().ok_or_else(|| anyhow!("Doctor not found"))?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn search_doctors(
        &self,
        filters: DoctorSearchFilters,
        auth_token: Option<&str>,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<Doctor>> {
        let mut path = String::from("/rest/v1/doctors?select=*");

        if let Some(ref specialty) = filters.specialty {
            path.push_str(&format!("&specialty=ilike.*{}*", specialty));
        }
        if let Some(min_rating) = filters.min_rating {
            path.push_str(&format!("&rating=gte.{}", min_rating));
        }
        if let Some(min_experience) = filters.min_experience {
            path.push_str(&format!("&years_experience=gte.{}", min_experience));
        }
        if let Some(ref language) = filters.language {
            path.push_str(&format!("&languages=cs.{{{}}}", language));
        }
        if filters.verified_only.unwrap_or(false) {
            path.push_str("&is_verified=eq.true");
        }
        if filters.accepting_only.unwrap_or(false) {
            path.push_str("&is_accepting_patients=eq.true");
        }

        path.push_str("&order=rating.desc");

        if let Some(limit) = limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if let Some(offset) = offset {
            path.push_str(&format!("&offset={}", offset));
        }

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;

        let doctors = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Doctor>, _>>()?;

        debug!("Doctor search returned {} results", doctors.len());
        Ok(doctors)
    }

    pub async fn update_doctor(
        &self,
        doctor_id: &str,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor> {
        debug!("Updating doctor profile: {}", doctor_id);

        let mut update_data = serde_json::Map::new();

        if let Some(first_name) = request.first_name {
            update_data.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(last_name) = request.last_name {
            update_data.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(bio) = request.bio {
            update_data.insert("bio".to_string(), json!(bio));
        }
        if let Some(specialty) = request.specialty {
            update_data.insert("specialty".to_string(), json!(specialty));
        }
        if let Some(sub_specialty) = request.sub_specialty {
            update_data.insert("sub_specialty".to_string(), json!(sub_specialty));
        }
        if let Some(years) = request.years_experience {
            update_data.insert("years_experience".to_string(), json!(years));
        }
        if let Some(languages) = request.languages {
            update_data.insert("languages".to_string(), json!(languages));
        }
        if let Some(timezone) = request.timezone {
            update_data.insert("timezone".to_string(), json!(timezone));
        }
        if let Some(lat) = request.clinic_latitude {
            update_data.insert("clinic_latitude".to_string(), json!(lat));
        }
        if let Some(lng) = request.clinic_longitude {
            update_data.insert("clinic_longitude".to_string(), json!(lng));
        }
        if let Some(accepting) = request.is_accepting_patients {
            update_data.insert("is_accepting_patients".to_string(), json!(accepting));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let doctor: Doctor = self
            .supabase
            .update_returning(&path, Some(auth_token), Value::Object(update_data))
            .await?;

        Ok(doctor)
    }

    pub async fn verify_doctor(
        &self,
        doctor_id: &str,
        is_verified: bool,
        auth_token: &str,
    ) -> Result<Doctor> {
        debug!("Setting verification for doctor {} to {}", doctor_id, is_verified);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let doctor: Doctor = self
            .supabase
            .update_returning(
                &path,
                Some(auth_token),
                json!({
                    "is_verified": is_verified,
                    "updated_at": Utc::now().to_rfc3339()
                }),
            )
            .await?;

        Ok(doctor)
    }
}
