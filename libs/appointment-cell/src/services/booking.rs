use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::SlotQuery;
use doctor_cell::services::availability::AvailabilityService;
use doctor_cell::services::doctor::DoctorService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use video_consult_cell::models::CreateConsultationRequest;
use video_consult_cell::services::session::SessionService;
use waitlist_cell::models::FreedSlot;
use waitlist_cell::services::store::WaitlistStore;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus,
    BookAppointmentRequest, CancelAppointmentRequest, ConsultationMode,
    RescheduleAppointmentRequest,
};
use crate::services::conflict::{ConflictChecker, ConflictParty};

const DEFAULT_DURATION_MINUTES: i32 = 30;

pub struct BookingService {
    supabase: SupabaseClient,
    doctor_service: DoctorService,
    availability_service: AvailabilityService,
    session_service: SessionService,
    conflict_checker: ConflictChecker,
    config: AppConfig,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctor_service: DoctorService::new(config),
            availability_service: AvailabilityService::new(config),
            session_service: SessionService::new(config),
            conflict_checker: ConflictChecker::new(config),
            config: config.clone(),
        }
    }

    /// Book a validated appointment inside one of the doctor's open slots.
    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!(
            "Booking appointment for patient {} with doctor {}",
            patient_id, request.doctor_id
        );

        let duration = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        if !(5..=120).contains(&duration) {
            return Err(AppointmentError::Validation(
                "Duration must be between 5 and 120 minutes".to_string(),
            ));
        }
        if request.start_time <= Utc::now() {
            return Err(AppointmentError::Validation(
                "Appointment must be in the future".to_string(),
            ));
        }

        let end_time = request.start_time + Duration::minutes(duration as i64);

        let doctor = self
            .doctor_service
            .get_doctor(&request.doctor_id.to_string(), Some(auth_token))
            .await
            .map_err(|_| AppointmentError::NotFound)?;
        if !doctor.is_accepting_patients {
            return Err(AppointmentError::Validation(
                "Doctor is not currently accepting patients".to_string(),
            ));
        }

        // The requested window must sit inside a computed open slot.
        let slots = self
            .availability_service
            .get_available_slots(
                &request.doctor_id.to_string(),
                SlotQuery {
                    date: request.start_time.date_naive(),
                    duration_minutes: Some(duration),
                },
                Some(auth_token),
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let fits = slots
            .iter()
            .any(|slot| slot.start_time <= request.start_time && end_time <= slot.end_time);
        if !fits {
            return Err(AppointmentError::SlotUnavailable);
        }

        self.assert_no_conflicts(
            &request.doctor_id,
            &patient_id,
            request.start_time,
            end_time,
            None,
            auth_token,
        )
        .await?;

        let appointment_data = json!({
            "patient_id": patient_id,
            "doctor_id": request.doctor_id,
            "start_time": request.start_time.to_rfc3339(),
            "end_time": end_time.to_rfc3339(),
            "appointment_type": request.appointment_type,
            "consultation_mode": request.consultation_mode,
            "status": AppointmentStatus::Confirmed,
            "patient_notes": request.patient_notes,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let appointment: Appointment = self
            .supabase
            .insert_returning("/rest/v1/appointments", Some(auth_token), appointment_data)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        info!(
            "Appointment {} confirmed for patient {} at {}",
            appointment.id, patient_id, appointment.start_time
        );

        if appointment.consultation_mode == ConsultationMode::Video {
            let session_request = CreateConsultationRequest {
                appointment_id: appointment.id,
                patient_id: appointment.patient_id,
                doctor_id: appointment.doctor_id,
                scheduled_start: appointment.start_time,
                scheduled_end: appointment.end_time,
            };

            // The appointment stands even if the session record fails; it can
            // be recreated through the video-consult endpoint.
            if let Err(e) = self
                .session_service
                .create_for_appointment(session_request, auth_token)
                .await
            {
                warn!(
                    "Failed to create video session for appointment {}: {}",
                    appointment.id, e
                );
            }
        }

        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: &Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .supabase
            .request(reqwest::Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
    }

    pub async fn list_for_patient(
        &self,
        patient_id: &str,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.list("patient_id", patient_id, query, auth_token).await
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: &str,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.list("doctor_id", doctor_id, query, auth_token).await
    }

    /// Move an appointment: the original is marked rescheduled and a
    /// successor record takes the new window.
    pub async fn reschedule(
        &self,
        appointment_id: &Uuid,
        request: RescheduleAppointmentRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;

        if !current.status.can_transition_to(AppointmentStatus::Rescheduled) {
            return Err(AppointmentError::InvalidTransition {
                from: current.status.to_string(),
                to: AppointmentStatus::Rescheduled.to_string(),
            });
        }

        let duration = request
            .new_duration_minutes
            .unwrap_or(current.duration_minutes() as i32);
        if !(5..=120).contains(&duration) {
            return Err(AppointmentError::Validation(
                "Duration must be between 5 and 120 minutes".to_string(),
            ));
        }
        if request.new_start_time <= Utc::now() {
            return Err(AppointmentError::Validation(
                "Appointment must be in the future".to_string(),
            ));
        }
        let new_end = request.new_start_time + Duration::minutes(duration as i64);

        let slots = self
            .availability_service
            .get_available_slots(
                &current.doctor_id.to_string(),
                SlotQuery {
                    date: request.new_start_time.date_naive(),
                    duration_minutes: Some(duration),
                },
                Some(auth_token),
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let fits = slots
            .iter()
            .any(|slot| slot.start_time <= request.new_start_time && new_end <= slot.end_time);
        if !fits {
            return Err(AppointmentError::SlotUnavailable);
        }

        self.assert_no_conflicts(
            &current.doctor_id,
            &current.patient_id,
            request.new_start_time,
            new_end,
            Some(appointment_id),
            auth_token,
        )
        .await?;

        let successor_data = json!({
            "patient_id": current.patient_id,
            "doctor_id": current.doctor_id,
            "start_time": request.new_start_time.to_rfc3339(),
            "end_time": new_end.to_rfc3339(),
            "appointment_type": current.appointment_type,
            "consultation_mode": current.consultation_mode,
            "status": AppointmentStatus::Confirmed,
            "patient_notes": current.patient_notes,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let successor: Appointment = self
            .supabase
            .insert_returning("/rest/v1/appointments", Some(auth_token), successor_data)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let _: Appointment = self
            .supabase
            .update_returning(
                &path,
                Some(auth_token),
                json!({
                    "status": AppointmentStatus::Rescheduled,
                    "cancellation_reason": request.reason,
                    "updated_at": Utc::now().to_rfc3339()
                }),
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        info!(
            "Appointment {} rescheduled to {} by {} (successor {})",
            appointment_id, successor.start_time, user.id, successor.id
        );
        Ok(successor)
    }

    /// Cancel and, when a confirmed window is released, hand it to the
    /// waitlist matcher.
    pub async fn cancel(
        &self,
        appointment_id: &Uuid,
        request: CancelAppointmentRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;

        if !current.status.can_transition_to(AppointmentStatus::Cancelled) {
            return Err(AppointmentError::InvalidTransition {
                from: current.status.to_string(),
                to: AppointmentStatus::Cancelled.to_string(),
            });
        }

        let released_confirmed_window = current.status == AppointmentStatus::Confirmed;

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let cancelled: Appointment = self
            .supabase
            .update_returning(
                &path,
                Some(auth_token),
                json!({
                    "status": AppointmentStatus::Cancelled,
                    "cancellation_reason": request.reason,
                    "updated_at": Utc::now().to_rfc3339()
                }),
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        info!("Appointment {} cancelled by {}", appointment_id, user.id);

        if released_confirmed_window {
            self.publish_freed_slot(&cancelled, auth_token).await;
        }

        Ok(cancelled)
    }

    // Private helpers

    async fn assert_no_conflicts(
        &self,
        doctor_id: &Uuid,
        patient_id: &Uuid,
        start_time: chrono::DateTime<Utc>,
        end_time: chrono::DateTime<Utc>,
        exclude: Option<&Uuid>,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let doctor_clashes = self
            .conflict_checker
            .overlapping_appointments(
                ConflictParty::Doctor,
                doctor_id,
                start_time,
                end_time,
                exclude,
                auth_token,
            )
            .await?;
        if !doctor_clashes.is_empty() {
            return Err(AppointmentError::Overlap(
                "the doctor already has an appointment in this window".to_string(),
            ));
        }

        let patient_clashes = self
            .conflict_checker
            .overlapping_appointments(
                ConflictParty::Patient,
                patient_id,
                start_time,
                end_time,
                exclude,
                auth_token,
            )
            .await?;
        if !patient_clashes.is_empty() {
            return Err(AppointmentError::Overlap(
                "the patient already has an appointment in this window".to_string(),
            ));
        }

        Ok(())
    }

    async fn list(
        &self,
        column: &str,
        id: &str,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut path = format!("/rest/v1/appointments?{}=eq.{}", column, id);

        if let Some(status) = query.status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        if let Some(from) = query.from_date {
            path.push_str(&format!("&start_time=gte.{}", from.to_rfc3339()));
        }
        if let Some(to) = query.to_date {
            path.push_str(&format!("&start_time=lte.{}", to.to_rfc3339()));
        }

        path.push_str("&order=start_time.asc");
        path.push_str(&format!("&limit={}", query.limit.unwrap_or(50)));
        if let Some(offset) = query.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        let rows: Vec<Value> = self
            .supabase
            .request(reqwest::Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
            })
            .collect()
    }

    /// Best effort: a cancelled slot that cannot reach the waitlist should
    /// never fail the cancellation itself.
    async fn publish_freed_slot(&self, appointment: &Appointment, auth_token: &str) {
        if !self.config.is_waitlist_configured() {
            debug!("Waitlist not configured; skipping freed-slot publication");
            return;
        }

        let specialty = match self
            .doctor_service
            .get_doctor(&appointment.doctor_id.to_string(), Some(auth_token))
            .await
        {
            Ok(doctor) => doctor.specialty,
            Err(e) => {
                warn!("Could not resolve doctor for freed slot: {}", e);
                return;
            }
        };

        let slot = FreedSlot {
            doctor_id: appointment.doctor_id,
            specialty,
            start_time: appointment.start_time,
            end_time: appointment.end_time,
        };

        match WaitlistStore::new(&self.config).await {
            Ok(store) => {
                if let Err(e) = store.publish_freed_slot(&slot).await {
                    warn!("Failed to publish freed slot: {}", e);
                } else {
                    info!(
                        "Freed slot published for doctor {} at {}",
                        slot.doctor_id, slot.start_time
                    );
                }
            }
            Err(e) => warn!("Waitlist store unavailable: {}", e),
        }
    }
}
