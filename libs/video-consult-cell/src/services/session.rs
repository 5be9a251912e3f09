use chrono::{Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{
    CreateConsultationRequest, ConsultationError, ConsultationStatus, JoinGrant, ParticipantRole,
    VideoConsultation,
};
use crate::services::token::RoomTokenSigner;

// Tokens and no-show detection both allow a little slack after the
// scheduled end.
const GRACE_MINUTES: i64 = 15;

pub struct SessionService {
    supabase: SupabaseClient,
    signer: RoomTokenSigner,
    join_lead_minutes: i64,
}

impl SessionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            signer: RoomTokenSigner::new(&config.video_token_secret),
            join_lead_minutes: config.video_join_lead_minutes,
        }
    }

    /// Create the session record backing a video appointment. Idempotent:
    /// an existing session for the appointment is returned as-is.
    pub async fn create_for_appointment(
        &self,
        request: CreateConsultationRequest,
        auth_token: &str,
    ) -> Result<VideoConsultation, ConsultationError> {
        if request.scheduled_start >= request.scheduled_end {
            return Err(ConsultationError::Validation(
                "Scheduled start must be before scheduled end".to_string(),
            ));
        }

        if let Some(existing) = self
            .get_for_appointment(&request.appointment_id, auth_token)
            .await?
        {
            debug!(
                "Consultation already exists for appointment {}",
                request.appointment_id
            );
            return Ok(existing);
        }

        let id = Uuid::new_v4();
        let session_data = json!({
            "id": id,
            "appointment_id": request.appointment_id,
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id,
            "scheduled_start": request.scheduled_start.to_rfc3339(),
            "scheduled_end": request.scheduled_end.to_rfc3339(),
            "status": ConsultationStatus::Scheduled,
            "room_name": format!("consult-{}", id),
            "started_at": null,
            "ended_at": null,
            "end_reason": null,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let consultation: VideoConsultation = self
            .supabase
            .insert_returning("/rest/v1/video_consultations", Some(auth_token), session_data)
            .await
            .map_err(|e| ConsultationError::Database(e.to_string()))?;

        info!(
            "Video consultation {} created for appointment {}",
            consultation.id, consultation.appointment_id
        );
        Ok(consultation)
    }

    pub async fn get(
        &self,
        consultation_id: &Uuid,
        auth_token: &str,
    ) -> Result<VideoConsultation, ConsultationError> {
        let path = format!("/rest/v1/video_consultations?id=eq.{}", consultation_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultationError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(ConsultationError::NotFound)?;
        serde_json::from_value(row).map_err(|e| ConsultationError::Database(e.to_string()))
    }

    pub async fn get_for_appointment(
        &self,
        appointment_id: &Uuid,
        auth_token: &str,
    ) -> Result<Option<VideoConsultation>, ConsultationError> {
        let path = format!(
            "/rest/v1/video_consultations?appointment_id=eq.{}",
            appointment_id
        );
        self.supabase
            .fetch_optional(&path, auth_token)
            .await
            .map_err(|e| ConsultationError::Database(e.to_string()))
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Vec<VideoConsultation>, ConsultationError> {
        let path = format!(
            "/rest/v1/video_consultations?or=(patient_id.eq.{},doctor_id.eq.{})&order=scheduled_start.desc&limit=50",
            user_id, user_id
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultationError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| ConsultationError::Database(e.to_string()))
            })
            .collect()
    }

    /// Admit a participant. The first join opens the waiting room; the
    /// doctor joining starts the consultation.
    pub async fn join(
        &self,
        consultation_id: &Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<(VideoConsultation, JoinGrant), ConsultationError> {
        let consultation = self.get(consultation_id, auth_token).await?;

        let role = consultation
            .role_of(&user.id)
            .ok_or(ConsultationError::NotParticipant)?;

        if consultation.status.is_terminal() {
            return Err(ConsultationError::InvalidTransition {
                from: consultation.status.to_string(),
                to: ConsultationStatus::InProgress.to_string(),
            });
        }

        let now = Utc::now();
        let opens_at = consultation.scheduled_start - Duration::minutes(self.join_lead_minutes);
        if now < opens_at {
            return Err(ConsultationError::OutsideJoinWindow(format!(
                "The room opens at {}",
                opens_at
            )));
        }
        if now > consultation.scheduled_end {
            return Err(ConsultationError::OutsideJoinWindow(
                "The scheduled window has ended".to_string(),
            ));
        }

        let mut consultation = consultation;

        if consultation.status == ConsultationStatus::Scheduled {
            consultation = self
                .advance_status(&consultation, ConsultationStatus::WaitingRoom, None, auth_token)
                .await?;
        }

        if role == ParticipantRole::Doctor
            && consultation.status == ConsultationStatus::WaitingRoom
        {
            consultation = self
                .advance_status(
                    &consultation,
                    ConsultationStatus::InProgress,
                    Some(json!({ "started_at": now.to_rfc3339() })),
                    auth_token,
                )
                .await?;
        }

        let expires_at = consultation.scheduled_end + Duration::minutes(GRACE_MINUTES);
        let token = self
            .signer
            .sign(&consultation.room_name, &user.id, &role.to_string(), expires_at)
            .map_err(ConsultationError::Validation)?;

        info!(
            "{} {} joined consultation {} ({})",
            role, user.id, consultation.id, consultation.status
        );

        let grant = JoinGrant {
            room_name: consultation.room_name.clone(),
            token,
            role,
            expires_at,
        };

        Ok((consultation, grant))
    }

    pub async fn complete(
        &self,
        consultation_id: &Uuid,
        auth_token: &str,
    ) -> Result<VideoConsultation, ConsultationError> {
        let consultation = self.get(consultation_id, auth_token).await?;

        if !consultation
            .status
            .can_transition_to(ConsultationStatus::Completed)
        {
            return Err(ConsultationError::InvalidTransition {
                from: consultation.status.to_string(),
                to: ConsultationStatus::Completed.to_string(),
            });
        }

        self.advance_status(
            &consultation,
            ConsultationStatus::Completed,
            Some(json!({
                "ended_at": Utc::now().to_rfc3339(),
                "end_reason": "completed"
            })),
            auth_token,
        )
        .await
    }

    pub async fn cancel(
        &self,
        consultation_id: &Uuid,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<VideoConsultation, ConsultationError> {
        let consultation = self.get(consultation_id, auth_token).await?;

        if !consultation
            .status
            .can_transition_to(ConsultationStatus::Cancelled)
        {
            return Err(ConsultationError::InvalidTransition {
                from: consultation.status.to_string(),
                to: ConsultationStatus::Cancelled.to_string(),
            });
        }

        self.advance_status(
            &consultation,
            ConsultationStatus::Cancelled,
            Some(json!({
                "ended_at": Utc::now().to_rfc3339(),
                "end_reason": reason.unwrap_or_else(|| "cancelled".to_string())
            })),
            auth_token,
        )
        .await
    }

    /// Mark sessions that never started as no-shows once their window
    /// (plus grace) has passed.
    pub async fn sweep_no_shows(&self, auth_token: &str) -> Result<u64, ConsultationError> {
        let cutoff = Utc::now() - Duration::minutes(GRACE_MINUTES);

        let path = format!(
            "/rest/v1/video_consultations?status=in.(scheduled,waiting_room)&scheduled_end=lt.{}",
            cutoff.to_rfc3339()
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultationError::Database(e.to_string()))?;

        let mut swept = 0;
        for row in rows {
            let consultation: VideoConsultation = match serde_json::from_value(row) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Skipping malformed consultation row: {}", e);
                    continue;
                }
            };

            match self
                .advance_status(
                    &consultation,
                    ConsultationStatus::NoShow,
                    Some(json!({
                        "ended_at": Utc::now().to_rfc3339(),
                        "end_reason": "no participants joined"
                    })),
                    auth_token,
                )
                .await
            {
                Ok(_) => swept += 1,
                Err(e) => warn!("Failed to sweep consultation {}: {}", consultation.id, e),
            }
        }

        if swept > 0 {
            info!("Marked {} consultation(s) as no-show", swept);
        }
        Ok(swept)
    }

    async fn advance_status(
        &self,
        consultation: &VideoConsultation,
        target: ConsultationStatus,
        extra_fields: Option<Value>,
        auth_token: &str,
    ) -> Result<VideoConsultation, ConsultationError> {
        if !consultation.status.can_transition_to(target) {
            return Err(ConsultationError::InvalidTransition {
                from: consultation.status.to_string(),
                to: target.to_string(),
            });
        }

        let mut update = serde_json::Map::new();
        update.insert("status".to_string(), json!(target));
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        if let Some(Value::Object(fields)) = extra_fields {
            update.extend(fields);
        }

        let path = format!("/rest/v1/video_consultations?id=eq.{}", consultation.id);
        let updated: VideoConsultation = self
            .supabase
            .update_returning(&path, Some(auth_token), Value::Object(update))
            .await
            .map_err(|e| ConsultationError::Database(e.to_string()))?;

        debug!(
            "Consultation {} moved from {} to {}",
            consultation.id, consultation.status, updated.status
        );
        Ok(updated)
    }
}
