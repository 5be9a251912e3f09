use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConsultation {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub status: ConsultationStatus,
    pub room_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoConsultation {
    pub fn role_of(&self, user_id: &str) -> Option<ParticipantRole> {
        if self.patient_id.to_string() == user_id {
            Some(ParticipantRole::Patient)
        } else if self.doctor_id.to_string() == user_id {
            Some(ParticipantRole::Doctor)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Scheduled,
    WaitingRoom,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl ConsultationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConsultationStatus::Completed
                | ConsultationStatus::Cancelled
                | ConsultationStatus::NoShow
        )
    }

    pub fn can_transition_to(&self, target: ConsultationStatus) -> bool {
        use ConsultationStatus::*;
        matches!(
            (self, target),
            (Scheduled, WaitingRoom)
                | (Scheduled, Cancelled)
                | (Scheduled, NoShow)
                | (WaitingRoom, InProgress)
                | (WaitingRoom, Cancelled)
                | (WaitingRoom, NoShow)
                | (InProgress, Completed)
        )
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::WaitingRoom => "waiting_room",
            ConsultationStatus::InProgress => "in_progress",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Cancelled => "cancelled",
            ConsultationStatus::NoShow => "no_show",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Patient,
    Doctor,
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantRole::Patient => write!(f, "patient"),
            ParticipantRole::Doctor => write!(f, "doctor"),
        }
    }
}

/// Signed permission to enter a consultation room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinGrant {
    pub room_name: String,
    pub token: String,
    pub role: ParticipantRole,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConsultationRequest {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelConsultationRequest {
    pub reason: Option<String>,
}

#[derive(Error, Debug)]
pub enum ConsultationError {
    #[error("Consultation not found")]
    NotFound,

    #[error("User is not a participant in this consultation")]
    NotParticipant,

    #[error("Outside the join window: {0}")]
    OutsideJoinWindow(String),

    #[error("Invalid consultation status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiting_room_precedes_in_progress() {
        assert!(ConsultationStatus::Scheduled.can_transition_to(ConsultationStatus::WaitingRoom));
        assert!(ConsultationStatus::WaitingRoom.can_transition_to(ConsultationStatus::InProgress));
        assert!(!ConsultationStatus::Scheduled.can_transition_to(ConsultationStatus::InProgress));
    }

    #[test]
    fn completed_only_from_in_progress() {
        for status in [
            ConsultationStatus::Scheduled,
            ConsultationStatus::WaitingRoom,
            ConsultationStatus::Completed,
            ConsultationStatus::Cancelled,
            ConsultationStatus::NoShow,
        ] {
            assert!(!status.can_transition_to(ConsultationStatus::Completed));
        }
        assert!(ConsultationStatus::InProgress.can_transition_to(ConsultationStatus::Completed));
    }

    #[test]
    fn terminal_states_are_absorbing() {
        for terminal in [
            ConsultationStatus::Completed,
            ConsultationStatus::Cancelled,
            ConsultationStatus::NoShow,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(ConsultationStatus::WaitingRoom));
            assert!(!terminal.can_transition_to(ConsultationStatus::InProgress));
        }
    }
}
