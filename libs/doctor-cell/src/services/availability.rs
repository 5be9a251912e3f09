use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AvailabilityOverride, AvailableSlot, CreateAvailabilityRequest, CreateOverrideRequest,
    DoctorAvailability, DoctorError, SlotQuery, UpdateAvailabilityRequest,
};

/// Appointment window already taken on a given day.
#[derive(Debug, Clone, Deserialize)]
pub struct BookedWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_schedule(
        &self,
        doctor_id: &str,
        request: CreateAvailabilityRequest,
        auth_token: &str,
    ) -> Result<DoctorAvailability, DoctorError> {
        debug!("Creating availability for doctor: {}", doctor_id);

        validate_window(
            request.day_of_week,
            request.start_time,
            request.end_time,
            request.slot_minutes,
            request.buffer_minutes.unwrap_or(0),
        )?;

        let existing = self
            .schedules_for_day(doctor_id, request.day_of_week, None)
            .await?;
        let conflict = existing.iter().any(|schedule| {
            request.start_time < schedule.end_time && request.end_time > schedule.start_time
        });
        if conflict {
            return Err(DoctorError::ScheduleConflict);
        }

        let schedule_data = json!({
            "doctor_id": doctor_id,
            "day_of_week": request.day_of_week,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "slot_minutes": request.slot_minutes,
            "buffer_minutes": request.buffer_minutes.unwrap_or(0),
            "is_available": true,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let schedule: DoctorAvailability = self
            .supabase
            .insert_returning("/rest/v1/doctor_availability", Some(auth_token), schedule_data)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        debug!("Availability created with ID: {}", schedule.id);
        Ok(schedule)
    }

    pub async fn update_schedule(
        &self,
        availability_id: &str,
        request: UpdateAvailabilityRequest,
        auth_token: &str,
    ) -> Result<DoctorAvailability, DoctorError> {
        debug!("Updating availability: {}", availability_id);

        let current = self.get_schedule(availability_id, auth_token).await?;

        let start_time = request.start_time.unwrap_or(current.start_time);
        let end_time = request.end_time.unwrap_or(current.end_time);
        let slot_minutes = request.slot_minutes.unwrap_or(current.slot_minutes);
        let buffer_minutes = request.buffer_minutes.unwrap_or(current.buffer_minutes);

        validate_window(current.day_of_week, start_time, end_time, slot_minutes, buffer_minutes)?;

        let siblings = self
            .schedules_for_day(
                &current.doctor_id.to_string(),
                current.day_of_week,
                Some(availability_id),
            )
            .await?;
        let conflict = siblings
            .iter()
            .any(|schedule| start_time < schedule.end_time && end_time > schedule.start_time);
        if conflict {
            return Err(DoctorError::ScheduleConflict);
        }

        let mut update_data = serde_json::Map::new();
        update_data.insert("start_time".to_string(), json!(start_time.format("%H:%M:%S").to_string()));
        update_data.insert("end_time".to_string(), json!(end_time.format("%H:%M:%S").to_string()));
        update_data.insert("slot_minutes".to_string(), json!(slot_minutes));
        update_data.insert("buffer_minutes".to_string(), json!(buffer_minutes));
        if let Some(is_available) = request.is_available {
            update_data.insert("is_available".to_string(), json!(is_available));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctor_availability?id=eq.{}", availability_id);
        let updated: DoctorAvailability = self
            .supabase
            .update_returning(&path, Some(auth_token), Value::Object(update_data))
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        Ok(updated)
    }

    pub async fn delete_schedule(
        &self,
        availability_id: &str,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        debug!("Deleting availability: {}", availability_id);

        let path = format!("/rest/v1/doctor_availability?id=eq.{}", availability_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        Ok(())
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<DoctorAvailability>, DoctorError> {
        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            doctor_id
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string())))
            .collect()
    }

    pub async fn create_override(
        &self,
        doctor_id: &str,
        request: CreateOverrideRequest,
        auth_token: &str,
    ) -> Result<AvailabilityOverride, DoctorError> {
        debug!(
            "Creating availability override for doctor {} on {}",
            doctor_id, request.override_date
        );

        let existing_path = format!(
            "/rest/v1/doctor_availability_overrides?doctor_id=eq.{}&override_date=eq.{}",
            doctor_id, request.override_date
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &existing_path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;
        if !existing.is_empty() {
            return Err(DoctorError::ScheduleConflict);
        }

        let override_data = json!({
            "doctor_id": doctor_id,
            "override_date": request.override_date,
            "is_open": request.is_open,
            "reason": request.reason,
            "created_at": Utc::now().to_rfc3339()
        });

        let entry: AvailabilityOverride = self
            .supabase
            .insert_returning("/rest/v1/doctor_availability_overrides", Some(auth_token), override_data)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        Ok(entry)
    }

    /// Compute bookable slots for a doctor on a specific date.
    pub async fn get_available_slots(
        &self,
        doctor_id: &str,
        query: SlotQuery,
        auth_token: Option<&str>,
    ) -> Result<Vec<AvailableSlot>, DoctorError> {
        debug!("Calculating available slots for doctor {} on {}", doctor_id, query.date);

        let day_of_week = query.date.weekday().num_days_from_sunday() as i32;

        let schedules = self
            .open_schedules_for_day(doctor_id, day_of_week, auth_token)
            .await?;

        let overrides = self.overrides_for_date(doctor_id, query.date, auth_token).await?;
        if overrides.iter().any(|entry| !entry.is_open) {
            debug!("Doctor {} is closed on {} by override", doctor_id, query.date);
            return Ok(vec![]);
        }

        let booked = self.booked_windows(doctor_id, query.date, auth_token).await?;

        let mut slots = Vec::new();
        for schedule in &schedules {
            slots.extend(build_slots(schedule, query.date, &booked, query.duration_minutes));
        }

        slots.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        let slots = remove_overlapping_slots(slots);

        debug!("Found {} available slots", slots.len());
        Ok(slots)
    }

    // Private helpers

    async fn get_schedule(
        &self,
        availability_id: &str,
        auth_token: &str,
    ) -> Result<DoctorAvailability, DoctorError> {
        let path = format!("/rest/v1/doctor_availability?id=eq.{}", availability_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(DoctorError::NotFound)?;
        serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string()))
    }

    async fn schedules_for_day(
        &self,
        doctor_id: &str,
        day_of_week: i32,
        exclude_id: Option<&str>,
    ) -> Result<Vec<DoctorAvailability>, DoctorError> {
        let mut path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&day_of_week=eq.{}",
            doctor_id, day_of_week
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string())))
            .collect()
    }

    async fn open_schedules_for_day(
        &self,
        doctor_id: &str,
        day_of_week: i32,
        auth_token: Option<&str>,
    ) -> Result<Vec<DoctorAvailability>, DoctorError> {
        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&day_of_week=eq.{}&is_available=eq.true&order=start_time.asc",
            doctor_id, day_of_week
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string())))
            .collect()
    }

    async fn overrides_for_date(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<AvailabilityOverride>, DoctorError> {
        let path = format!(
            "/rest/v1/doctor_availability_overrides?doctor_id=eq.{}&override_date=eq.{}",
            doctor_id, date
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string())))
            .collect()
    }

    async fn booked_windows(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<BookedWindow>, DoctorError> {
        let day_start = date.and_time(NaiveTime::MIN).and_utc();
        let day_end = (date + Days::new(1)).and_time(NaiveTime::MIN).and_utc();

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&start_time=gte.{}&start_time=lt.{}&status=in.(confirmed,in_progress)&select=start_time,end_time&order=start_time.asc",
            doctor_id,
            day_start.to_rfc3339(),
            day_end.to_rfc3339()
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string())))
            .collect()
    }
}

fn validate_window(
    day_of_week: i32,
    start_time: NaiveTime,
    end_time: NaiveTime,
    slot_minutes: i32,
    buffer_minutes: i32,
) -> Result<(), DoctorError> {
    if !(0..=6).contains(&day_of_week) {
        return Err(DoctorError::InvalidSchedule(
            "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }
    if start_time >= end_time {
        return Err(DoctorError::InvalidSchedule(
            "Start time must be before end time".to_string(),
        ));
    }
    if !(5..=120).contains(&slot_minutes) {
        return Err(DoctorError::InvalidSchedule(
            "Slot length must be between 5 and 120 minutes".to_string(),
        ));
    }
    if !(0..=60).contains(&buffer_minutes) {
        return Err(DoctorError::InvalidSchedule(
            "Buffer must be between 0 and 60 minutes".to_string(),
        ));
    }
    Ok(())
}

/// Step through a weekly schedule on `date`, skipping taken windows.
fn build_slots(
    schedule: &DoctorAvailability,
    date: NaiveDate,
    booked: &[BookedWindow],
    requested_duration: Option<i32>,
) -> Vec<AvailableSlot> {
    let duration_minutes = requested_duration.unwrap_or(schedule.slot_minutes);
    if duration_minutes <= 0 {
        return vec![];
    }
    let step_minutes = duration_minutes + schedule.buffer_minutes;

    let window_start = date.and_time(schedule.start_time).and_utc();
    let window_end = date.and_time(schedule.end_time).and_utc();

    let mut slots = Vec::new();
    let mut current = window_start;

    while current + Duration::minutes(duration_minutes as i64) <= window_end {
        let slot_end = current + Duration::minutes(duration_minutes as i64);

        let taken = booked
            .iter()
            .any(|window| current < window.end_time && slot_end > window.start_time);

        if !taken {
            slots.push(AvailableSlot {
                start_time: current,
                end_time: slot_end,
                duration_minutes,
            });
        }

        current += Duration::minutes(step_minutes as i64);
    }

    slots
}

fn remove_overlapping_slots(slots: Vec<AvailableSlot>) -> Vec<AvailableSlot> {
    let mut result: Vec<AvailableSlot> = Vec::with_capacity(slots.len());
    let mut last_end = DateTime::<Utc>::MIN_UTC;

    for slot in slots {
        if slot.start_time >= last_end {
            last_end = slot.end_time;
            result.push(slot);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn schedule(start: (u32, u32), end: (u32, u32), slot: i32, buffer: i32) -> DoctorAvailability {
        DoctorAvailability {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            day_of_week: 1,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            slot_minutes: slot,
            buffer_minutes: buffer,
            is_available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap() // a Monday
    }

    #[test]
    fn generates_back_to_back_slots() {
        let slots = build_slots(&schedule((9, 0), (11, 0), 30, 0), date(), &[], None);

        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0].start_time, date().and_hms_opt(9, 0, 0).unwrap().and_utc());
        assert_eq!(slots[3].end_time, date().and_hms_opt(11, 0, 0).unwrap().and_utc());
    }

    #[test]
    fn respects_buffer_between_slots() {
        let slots = build_slots(&schedule((9, 0), (10, 30), 30, 15), date(), &[], None);

        // 09:00-09:30, 09:45-10:15; 10:30 start would overrun the window
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].start_time, date().and_hms_opt(9, 45, 0).unwrap().and_utc());
    }

    #[test]
    fn skips_booked_windows() {
        let booked = vec![BookedWindow {
            start_time: date().and_hms_opt(9, 30, 0).unwrap().and_utc(),
            end_time: date().and_hms_opt(10, 0, 0).unwrap().and_utc(),
        }];

        let slots = build_slots(&schedule((9, 0), (11, 0), 30, 0), date(), &booked, None);

        assert_eq!(slots.len(), 3);
        assert!(slots
            .iter()
            .all(|s| !(s.start_time < booked[0].end_time && s.end_time > booked[0].start_time)));
    }

    #[test]
    fn requested_duration_overrides_schedule_slot_length() {
        let slots = build_slots(&schedule((9, 0), (10, 0), 30, 0), date(), &[], Some(60));

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].duration_minutes, 60);
    }

    #[test]
    fn overlapping_slots_are_deduplicated() {
        let base = date().and_hms_opt(9, 0, 0).unwrap().and_utc();
        let slots = vec![
            AvailableSlot {
                start_time: base,
                end_time: base + Duration::minutes(30),
                duration_minutes: 30,
            },
            AvailableSlot {
                start_time: base + Duration::minutes(15),
                end_time: base + Duration::minutes(45),
                duration_minutes: 30,
            },
            AvailableSlot {
                start_time: base + Duration::minutes(30),
                end_time: base + Duration::minutes(60),
                duration_minutes: 30,
            },
        ];

        let kept = remove_overlapping_slots(slots);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].start_time, base + Duration::minutes(30));
    }

    #[test]
    fn rejects_invalid_windows() {
        assert!(matches!(
            validate_window(7, NaiveTime::MIN, NaiveTime::from_hms_opt(1, 0, 0).unwrap(), 30, 0),
            Err(DoctorError::InvalidSchedule(_))
        ));
        assert!(matches!(
            validate_window(1, NaiveTime::from_hms_opt(10, 0, 0).unwrap(), NaiveTime::from_hms_opt(9, 0, 0).unwrap(), 30, 0),
            Err(DoctorError::InvalidSchedule(_))
        ));
        assert!(matches!(
            validate_window(1, NaiveTime::MIN, NaiveTime::from_hms_opt(1, 0, 0).unwrap(), 0, 0),
            Err(DoctorError::InvalidSchedule(_))
        ));
    }
}
