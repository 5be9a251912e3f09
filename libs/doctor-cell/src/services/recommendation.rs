use std::collections::HashMap;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AvailableSlot, Doctor, DoctorError, DoctorRecommendation, DoctorSearchFilters,
    RecommendationRequest, SlotQuery,
};
use crate::services::availability::AvailabilityService;
use crate::services::doctor::DoctorService;

// Weighted linear model; the weights sum to 1.0 so scores stay in [0, 1]
// before the returning-patient bonus is applied.
const SPECIALTY_WEIGHT: f32 = 0.35;
const RATING_WEIGHT: f32 = 0.25;
const DISTANCE_WEIGHT: f32 = 0.20;
const LANGUAGE_WEIGHT: f32 = 0.20;
const RETURNING_PATIENT_BONUS: f32 = 0.10;

// Beyond this distance the proximity factor bottoms out.
const DISTANCE_HORIZON_KM: f64 = 25.0;

const CANDIDATE_POOL_SIZE: i32 = 50;
const DEFAULT_MAX_RESULTS: usize = 10;

pub struct RecommendationService {
    supabase: SupabaseClient,
    doctor_service: DoctorService,
    availability_service: AvailabilityService,
    default_site: (f64, f64),
}

impl RecommendationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctor_service: DoctorService::new(config),
            availability_service: AvailabilityService::new(config),
            default_site: (config.clinic_latitude, config.clinic_longitude),
        }
    }

    /// Rank doctors for a patient request, best match first.
    pub async fn recommend_doctors(
        &self,
        request: RecommendationRequest,
        auth_token: &str,
    ) -> Result<Vec<DoctorRecommendation>, DoctorError> {
        debug!("Building recommendations for patient: {}", request.patient_id);

        if let Some(ref specialty) = request.specialty {
            self.ensure_specialty_coverage(specialty, auth_token).await?;
        }

        let filters = DoctorSearchFilters {
            specialty: request.specialty.clone(),
            min_rating: None,
            min_experience: None,
            language: None,
            verified_only: Some(true),
            accepting_only: Some(true),
        };

        let candidates = self
            .doctor_service
            .search_doctors(filters, Some(auth_token), Some(CANDIDATE_POOL_SIZE), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        debug!("Found {} candidate doctors", candidates.len());

        let visit_counts = self
            .completed_visit_counts(&request.patient_id.to_string(), auth_token)
            .await?;

        let mut recommendations = Vec::new();
        for doctor in candidates {
            let slots = match request.preferred_date {
                Some(date) => self
                    .availability_service
                    .get_available_slots(
                        &doctor.id.to_string(),
                        SlotQuery { date, duration_minutes: None },
                        Some(auth_token),
                    )
                    .await
                    .unwrap_or_default(),
                None => vec![],
            };

            let prior_visits = visit_counts.get(&doctor.id.to_string()).copied().unwrap_or(0);
            let score = score_doctor(&doctor, &request, prior_visits, self.default_site);
            let reasons = build_reasons(&doctor, &request, prior_visits, &slots, self.default_site);

            recommendations.push(DoctorRecommendation {
                doctor,
                score,
                reasons,
                available_slots: slots,
            });
        }

        recommendations.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        recommendations.truncate(request.max_results.unwrap_or(DEFAULT_MAX_RESULTS));

        info!(
            "Returning {} recommendations for patient {}",
            recommendations.len(),
            request.patient_id
        );
        Ok(recommendations)
    }

    /// Highest-scoring match only.
    pub async fn best_doctor(
        &self,
        mut request: RecommendationRequest,
        auth_token: &str,
    ) -> Result<Option<DoctorRecommendation>, DoctorError> {
        request.max_results = Some(1);
        let matches = self.recommend_doctors(request, auth_token).await?;
        Ok(matches.into_iter().next())
    }

    async fn ensure_specialty_coverage(
        &self,
        specialty: &str,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        let filters = DoctorSearchFilters {
            specialty: Some(specialty.to_string()),
            verified_only: Some(true),
            ..Default::default()
        };

        let doctors = self
            .doctor_service
            .search_doctors(filters, Some(auth_token), Some(1), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        if doctors.is_empty() {
            return Err(DoctorError::NoSpecialtyCoverage(specialty.to_string()));
        }
        Ok(())
    }

    /// Completed-appointment counts per doctor for this patient.
    async fn completed_visit_counts(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<HashMap<String, usize>, DoctorError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&status=eq.completed&select=doctor_id&order=created_at.desc&limit=200",
            patient_id
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let mut counts: HashMap<String, usize> = HashMap::new();
        for row in rows {
            if let Some(doctor_id) = row.get("doctor_id").and_then(|id| id.as_str()) {
                *counts.entry(doctor_id.to_string()).or_insert(0) += 1;
            }
        }

        debug!("Patient has history with {} doctor(s)", counts.len());
        Ok(counts)
    }
}

fn score_doctor(
    doctor: &Doctor,
    request: &RecommendationRequest,
    prior_visits: usize,
    default_site: (f64, f64),
) -> f32 {
    let specialty = specialty_factor(doctor, request.specialty.as_deref());
    let rating = (doctor.rating / 5.0).clamp(0.0, 1.0);
    let distance = distance_factor(doctor, request, default_site);
    let language = language_factor(doctor, &request.preferred_languages);

    let mut score = SPECIALTY_WEIGHT * specialty
        + RATING_WEIGHT * rating
        + DISTANCE_WEIGHT * distance
        + LANGUAGE_WEIGHT * language;

    if prior_visits > 0 {
        score += RETURNING_PATIENT_BONUS;
    }

    score.min(1.0)
}

fn specialty_factor(doctor: &Doctor, required: Option<&str>) -> f32 {
    match required {
        Some(required) => {
            if doctor.specialty.eq_ignore_ascii_case(required) {
                1.0
            } else if doctor
                .sub_specialty
                .as_deref()
                .map(|s| s.to_lowercase().contains(&required.to_lowercase()))
                .unwrap_or(false)
            {
                0.6
            } else {
                0.0
            }
        }
        // No requirement stated: every candidate gets most of the credit.
        None => 0.8,
    }
}

fn distance_factor(
    doctor: &Doctor,
    request: &RecommendationRequest,
    default_site: (f64, f64),
) -> f32 {
    match patient_distance_km(doctor, request, default_site) {
        Some(distance) => (1.0 - distance / DISTANCE_HORIZON_KM).clamp(0.0, 1.0) as f32,
        // Unknown location scores neutrally rather than penalizing anyone.
        None => 0.5,
    }
}

fn patient_distance_km(
    doctor: &Doctor,
    request: &RecommendationRequest,
    default_site: (f64, f64),
) -> Option<f64> {
    let (patient_lat, patient_lng) = match (request.patient_latitude, request.patient_longitude) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => return None,
    };

    let (site_lat, site_lng) = match (doctor.clinic_latitude, doctor.clinic_longitude) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => default_site,
    };

    Some(haversine_km(patient_lat, patient_lng, site_lat, site_lng))
}

fn language_factor(doctor: &Doctor, preferred: &[String]) -> f32 {
    if preferred.is_empty() {
        return 0.5;
    }

    let overlap = preferred.iter().filter(|l| doctor.speaks(l)).count();
    overlap as f32 / preferred.len() as f32
}

/// Great-circle distance between two coordinates in kilometres.
fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

fn build_reasons(
    doctor: &Doctor,
    request: &RecommendationRequest,
    prior_visits: usize,
    slots: &[AvailableSlot],
    default_site: (f64, f64),
) -> Vec<String> {
    let mut reasons = Vec::new();

    if prior_visits > 0 {
        reasons.push(format!(
            "Seen previously - {} past consultation(s) with this doctor",
            prior_visits
        ));
    }

    if let Some(ref specialty) = request.specialty {
        if doctor.specialty.eq_ignore_ascii_case(specialty) {
            reasons.push(format!("Specializes in {}", specialty));
        }
    }

    if doctor.rating >= 4.5 {
        reasons.push(format!("Highly rated ({:.1}/5.0)", doctor.rating));
    }

    if let Some(years) = doctor.years_experience {
        if years >= 10 {
            reasons.push(format!("{} years of experience", years));
        }
    }

    let spoken: Vec<&String> = request
        .preferred_languages
        .iter()
        .filter(|l| doctor.speaks(l))
        .collect();
    if !spoken.is_empty() {
        let names: Vec<&str> = spoken.iter().map(|l| l.as_str()).collect();
        reasons.push(format!("Speaks {}", names.join(", ")));
    }

    if let Some(distance) = patient_distance_km(doctor, request, default_site) {
        if distance <= DISTANCE_HORIZON_KM {
            reasons.push(format!("{:.1} km from you", distance));
        }
    }

    if !slots.is_empty() {
        if let Some(date) = request.preferred_date {
            reasons.push(format!("Available on {}", date));
        }
    }

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn doctor(specialty: &str, rating: f32, languages: &[&str]) -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            first_name: "Test".to_string(),
            last_name: "Doctor".to_string(),
            email: "doctor@example.com".to_string(),
            specialty: specialty.to_string(),
            sub_specialty: None,
            bio: None,
            license_number: "M00001A".to_string(),
            years_experience: Some(5),
            languages: languages.iter().map(|l| l.to_string()).collect(),
            timezone: None,
            clinic_latitude: Some(1.3521),
            clinic_longitude: Some(103.8198),
            is_verified: true,
            is_accepting_patients: true,
            rating,
            total_consultations: 100,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request(specialty: Option<&str>) -> RecommendationRequest {
        RecommendationRequest {
            patient_id: Uuid::new_v4(),
            specialty: specialty.map(str::to_string),
            preferred_date: None,
            patient_latitude: None,
            patient_longitude: None,
            preferred_languages: vec![],
            max_results: None,
        }
    }

    const SITE: (f64, f64) = (1.3521, 103.8198);

    #[test]
    fn scores_stay_in_unit_interval() {
        let best = doctor("Cardiology", 5.0, &["English", "Mandarin"]);
        let mut req = request(Some("Cardiology"));
        req.preferred_languages = vec!["English".to_string(), "Mandarin".to_string()];
        req.patient_latitude = Some(1.3521);
        req.patient_longitude = Some(103.8198);

        let score = score_doctor(&best, &req, 3, SITE);
        assert!(score <= 1.0);
        assert!(score > 0.9);

        let worst = doctor("Dermatology", 0.0, &[]);
        let score = score_doctor(&worst, &req, 0, SITE);
        assert!(score >= 0.0);
        assert!(score < 0.3);
    }

    #[test]
    fn specialty_match_outranks_mismatch() {
        let matching = doctor("Cardiology", 3.0, &[]);
        let mismatched = doctor("Dermatology", 5.0, &[]);
        let req = request(Some("Cardiology"));

        let matched_score = score_doctor(&matching, &req, 0, SITE);
        let mismatched_score = score_doctor(&mismatched, &req, 0, SITE);
        assert!(matched_score > mismatched_score);
    }

    #[test]
    fn sub_specialty_earns_partial_credit() {
        let mut partial = doctor("Internal Medicine", 4.0, &[]);
        partial.sub_specialty = Some("Cardiology".to_string());

        let factor = specialty_factor(&partial, Some("Cardiology"));
        assert!(factor > 0.0 && factor < 1.0);
    }

    #[test]
    fn missing_inputs_score_neutrally() {
        let d = doctor("General Practice", 4.0, &["English"]);
        let req = request(None);

        assert_eq!(distance_factor(&d, &req, SITE), 0.5);
        assert_eq!(language_factor(&d, &req.preferred_languages), 0.5);
    }

    #[test]
    fn language_overlap_is_proportional() {
        let d = doctor("General Practice", 4.0, &["English", "Malay"]);
        let preferred = vec!["english".to_string(), "Tamil".to_string()];

        assert_eq!(language_factor(&d, &preferred), 0.5);
    }

    #[test]
    fn returning_patient_bonus_caps_at_one() {
        let d = doctor("Cardiology", 5.0, &["English"]);
        let mut req = request(Some("Cardiology"));
        req.preferred_languages = vec!["English".to_string()];
        req.patient_latitude = Some(1.3521);
        req.patient_longitude = Some(103.8198);

        let score = score_doctor(&d, &req, 10, SITE);
        assert!(score <= 1.0);
    }

    #[test]
    fn nearby_clinic_beats_distant_clinic() {
        let near = doctor("General Practice", 4.0, &[]);
        let mut far = doctor("General Practice", 4.0, &[]);
        far.clinic_latitude = Some(1.45);
        far.clinic_longitude = Some(104.0);

        let mut req = request(None);
        req.patient_latitude = Some(1.3521);
        req.patient_longitude = Some(103.8198);

        assert!(distance_factor(&near, &req, SITE) > distance_factor(&far, &req, SITE));
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Changi Airport to Jurong East is roughly 31-33 km.
        let d = haversine_km(1.3644, 103.9915, 1.3329, 103.7436);
        assert!(d > 25.0 && d < 35.0, "unexpected distance: {}", d);
    }
}
