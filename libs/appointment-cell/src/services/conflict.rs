use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError};

/// Half-open interval overlap; touching boundaries do not conflict.
pub fn windows_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

#[derive(Debug, Clone, Copy)]
pub enum ConflictParty {
    Doctor,
    Patient,
}

impl ConflictParty {
    fn column(&self) -> &'static str {
        match self {
            ConflictParty::Doctor => "doctor_id",
            ConflictParty::Patient => "patient_id",
        }
    }
}

pub struct ConflictChecker {
    supabase: SupabaseClient,
}

impl ConflictChecker {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Non-terminal appointments for `party` overlapping the window.
    pub async fn overlapping_appointments(
        &self,
        party: ConflictParty,
        party_id: &Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment: Option<&Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut path = format!(
            "/rest/v1/appointments?{}=eq.{}&status=in.(pending,confirmed,in_progress)&start_time=lt.{}&end_time=gt.{}",
            party.column(),
            party_id,
            end_time.to_rfc3339(),
            start_time.to_rfc3339()
        );
        if let Some(id) = exclude_appointment {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let appointments = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        debug!(
            "Found {} overlapping appointment(s) for {} {}",
            appointments.len(),
            party.column(),
            party_id
        );
        Ok(appointments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_750_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn overlapping_windows_conflict() {
        assert!(windows_overlap(at(0), at(30), at(15), at(45)));
        assert!(windows_overlap(at(15), at(45), at(0), at(30)));
        assert!(windows_overlap(at(0), at(60), at(15), at(30)));
    }

    #[test]
    fn touching_windows_do_not_conflict() {
        assert!(!windows_overlap(at(0), at(30), at(30), at(60)));
        assert!(!windows_overlap(at(30), at(60), at(0), at(30)));
    }

    #[test]
    fn disjoint_windows_do_not_conflict() {
        assert!(!windows_overlap(at(0), at(30), at(45), at(60)));
    }
}
