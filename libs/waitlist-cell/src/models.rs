use std::cmp::Reverse;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub specialty: String,
    pub preferred_doctor_id: Option<Uuid>,
    pub earliest_start: DateTime<Utc>,
    pub latest_start: DateTime<Utc>,
    pub urgency: WaitlistUrgency,
    pub status: WaitlistStatus,
    pub offered_slot: Option<OfferedSlot>,
    pub offer_expires_at: Option<DateTime<Utc>>,
    pub offer_lapses: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WaitlistEntry {
    pub fn new(patient_id: Uuid, request: JoinWaitlistRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_id,
            specialty: request.specialty,
            preferred_doctor_id: request.preferred_doctor_id,
            earliest_start: request.earliest_start,
            latest_start: request.latest_start,
            urgency: request.urgency.unwrap_or(WaitlistUrgency::Routine),
            status: WaitlistStatus::Waiting,
            offered_slot: None,
            offer_expires_at: None,
            offer_lapses: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Whether a freed slot satisfies this entry's constraints.
    pub fn accepts(&self, slot: &FreedSlot) -> bool {
        self.status == WaitlistStatus::Waiting
            && self.specialty.eq_ignore_ascii_case(&slot.specialty)
            && self.earliest_start <= slot.start_time
            && slot.start_time <= self.latest_start
    }

    pub fn prefers(&self, doctor_id: &Uuid) -> bool {
        self.preferred_doctor_id.as_ref() == Some(doctor_id)
    }

    pub fn offer_is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == WaitlistStatus::Offered
            && self.offer_expires_at.map(|at| now <= at).unwrap_or(false)
    }
}

/// Pick the entry a freed slot should be offered to: preferred-doctor
/// entries first, then urgency, then first come first served.
pub fn select_best_entry<'a>(
    entries: &'a [WaitlistEntry],
    slot: &FreedSlot,
) -> Option<&'a WaitlistEntry> {
    entries
        .iter()
        .filter(|entry| entry.accepts(slot))
        .max_by_key(|entry| {
            (
                entry.prefers(&slot.doctor_id),
                entry.urgency.rank(),
                Reverse(entry.created_at),
            )
        })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfferedSlot {
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistUrgency {
    Routine,
    Soon,
    Urgent,
}

impl WaitlistUrgency {
    pub fn rank(&self) -> u8 {
        match self {
            WaitlistUrgency::Routine => 0,
            WaitlistUrgency::Soon => 1,
            WaitlistUrgency::Urgent => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    Waiting,
    Offered,
    Booked,
    Expired,
    Cancelled,
}

impl WaitlistStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WaitlistStatus::Booked | WaitlistStatus::Expired | WaitlistStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, target: WaitlistStatus) -> bool {
        use WaitlistStatus::*;
        matches!(
            (self, target),
            (Waiting, Offered)
                | (Waiting, Cancelled)
                | (Waiting, Expired)
                | (Offered, Booked)
                | (Offered, Waiting)
                | (Offered, Expired)
                | (Offered, Cancelled)
        )
    }
}

impl fmt::Display for WaitlistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaitlistStatus::Waiting => "waiting",
            WaitlistStatus::Offered => "offered",
            WaitlistStatus::Booked => "booked",
            WaitlistStatus::Expired => "expired",
            WaitlistStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Appointment window released back into the pool by a cancellation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FreedSlot {
    pub doctor_id: Uuid,
    pub specialty: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinWaitlistRequest {
    pub specialty: String,
    pub preferred_doctor_id: Option<Uuid>,
    pub earliest_start: DateTime<Utc>,
    pub latest_start: DateTime<Utc>,
    pub urgency: Option<WaitlistUrgency>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaitlistStats {
    pub waiting: u64,
    pub offered: u64,
    pub booked_total: u64,
    pub expired_total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn slot(specialty: &str, start_offset_hours: i64) -> FreedSlot {
        let start = Utc::now() + Duration::hours(start_offset_hours);
        FreedSlot {
            doctor_id: Uuid::new_v4(),
            specialty: specialty.to_string(),
            start_time: start,
            end_time: start + Duration::minutes(30),
        }
    }

    fn entry(specialty: &str, urgency: WaitlistUrgency) -> WaitlistEntry {
        WaitlistEntry::new(
            Uuid::new_v4(),
            JoinWaitlistRequest {
                specialty: specialty.to_string(),
                preferred_doctor_id: None,
                earliest_start: Utc::now(),
                latest_start: Utc::now() + Duration::days(14),
                urgency: Some(urgency),
            },
        )
    }

    #[test]
    fn accepts_requires_specialty_and_window() {
        let e = entry("Cardiology", WaitlistUrgency::Routine);

        assert!(e.accepts(&slot("Cardiology", 24)));
        assert!(e.accepts(&slot("cardiology", 24)));
        assert!(!e.accepts(&slot("Dermatology", 24)));
        assert!(!e.accepts(&slot("Cardiology", 24 * 30)));
    }

    #[test]
    fn non_waiting_entries_never_accept() {
        let mut e = entry("Cardiology", WaitlistUrgency::Urgent);
        e.status = WaitlistStatus::Offered;
        assert!(!e.accepts(&slot("Cardiology", 24)));
    }

    #[test]
    fn urgency_outranks_queue_position() {
        let mut routine = entry("Cardiology", WaitlistUrgency::Routine);
        routine.created_at = Utc::now() - Duration::days(5);
        let urgent = entry("Cardiology", WaitlistUrgency::Urgent);

        let entries = vec![routine, urgent.clone()];
        let s = slot("Cardiology", 24);

        assert_eq!(select_best_entry(&entries, &s).unwrap().id, urgent.id);
    }

    #[test]
    fn preferred_doctor_outranks_urgency() {
        let s = slot("Cardiology", 24);

        let urgent = entry("Cardiology", WaitlistUrgency::Urgent);
        let mut preferring = entry("Cardiology", WaitlistUrgency::Routine);
        preferring.preferred_doctor_id = Some(s.doctor_id);

        let entries = vec![urgent, preferring.clone()];
        assert_eq!(select_best_entry(&entries, &s).unwrap().id, preferring.id);
    }

    #[test]
    fn equal_priority_falls_back_to_fifo() {
        let mut older = entry("Cardiology", WaitlistUrgency::Soon);
        older.created_at = Utc::now() - Duration::days(3);
        let newer = entry("Cardiology", WaitlistUrgency::Soon);

        let entries = vec![newer, older.clone()];
        let s = slot("Cardiology", 24);

        assert_eq!(select_best_entry(&entries, &s).unwrap().id, older.id);
    }

    #[test]
    fn no_acceptable_entry_yields_none() {
        let entries = vec![entry("Dermatology", WaitlistUrgency::Urgent)];
        assert!(select_best_entry(&entries, &slot("Cardiology", 24)).is_none());
    }

    #[test]
    fn offered_entries_can_revert_or_expire() {
        let offered = WaitlistStatus::Offered;
        assert!(offered.can_transition_to(WaitlistStatus::Booked));
        assert!(offered.can_transition_to(WaitlistStatus::Waiting));
        assert!(offered.can_transition_to(WaitlistStatus::Expired));
    }

    #[test]
    fn terminal_states_are_absorbing() {
        for terminal in [
            WaitlistStatus::Booked,
            WaitlistStatus::Expired,
            WaitlistStatus::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            for target in [
                WaitlistStatus::Waiting,
                WaitlistStatus::Offered,
                WaitlistStatus::Booked,
            ] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn offer_liveness_tracks_expiry() {
        let mut e = entry("Cardiology", WaitlistUrgency::Routine);
        e.status = WaitlistStatus::Offered;
        e.offer_expires_at = Some(Utc::now() + Duration::minutes(30));
        assert!(e.offer_is_live(Utc::now()));
        assert!(!e.offer_is_live(Utc::now() + Duration::hours(1)));
    }
}
