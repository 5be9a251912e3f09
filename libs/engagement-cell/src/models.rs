use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ==============================================================================
// CONTACT FORMS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactForm {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    New,
    Acknowledged,
    Resolved,
    Spam,
}

impl ContactStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContactStatus::Resolved | ContactStatus::Spam)
    }

    pub fn can_transition_to(&self, target: ContactStatus) -> bool {
        use ContactStatus::*;
        matches!(
            (self, target),
            (New, Acknowledged) | (New, Resolved) | (New, Spam) | (Acknowledged, Resolved) | (Acknowledged, Spam)
        )
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContactStatus::New => "new",
            ContactStatus::Acknowledged => "acknowledged",
            ContactStatus::Resolved => "resolved",
            ContactStatus::Spam => "spam",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitContactRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateContactStatusRequest {
    pub status: ContactStatus,
}

// ==============================================================================
// ENQUIRIES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enquiry {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    pub channel: EnquiryChannel,
    pub topic: EnquiryTopic,
    pub message: String,
    pub routed_to: String,
    pub status: EnquiryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnquiryChannel {
    Web,
    Phone,
    WalkIn,
    Chat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnquiryTopic {
    Appointments,
    Billing,
    Services,
    Feedback,
    General,
}

impl fmt::Display for EnquiryTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnquiryTopic::Appointments => "appointments",
            EnquiryTopic::Billing => "billing",
            EnquiryTopic::Services => "services",
            EnquiryTopic::Feedback => "feedback",
            EnquiryTopic::General => "general",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnquiryStatus {
    Open,
    InProgress,
    Closed,
}

impl EnquiryStatus {
    pub fn can_transition_to(&self, target: EnquiryStatus) -> bool {
        use EnquiryStatus::*;
        matches!((self, target), (Open, InProgress) | (Open, Closed) | (InProgress, Closed))
    }
}

impl fmt::Display for EnquiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnquiryStatus::Open => "open",
            EnquiryStatus::InProgress => "in_progress",
            EnquiryStatus::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitEnquiryRequest {
    pub topic: Option<EnquiryTopic>,
    pub channel: EnquiryChannel,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateEnquiryStatusRequest {
    pub status: EnquiryStatus,
}

// ==============================================================================
// SOCIAL MENTIONS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialMention {
    pub id: Uuid,
    pub channel: SocialChannel,
    pub author: String,
    pub content: String,
    pub posted_at: DateTime<Utc>,
    pub sentiment_score: f32,
    pub sentiment_label: SentimentLabel,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SocialChannel {
    Facebook,
    Instagram,
    GoogleReviews,
    Twitter,
}

impl fmt::Display for SocialChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocialChannel::Facebook => "facebook",
            SocialChannel::Instagram => "instagram",
            SocialChannel::GoogleReviews => "google_reviews",
            SocialChannel::Twitter => "twitter",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// Labels split at +/- 0.2 so weakly mixed text reads as neutral.
    pub fn from_score(score: f32) -> Self {
        if score > 0.2 {
            SentimentLabel::Positive
        } else if score < -0.2 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestMentionRequest {
    pub channel: SocialChannel,
    pub author: String,
    pub content: String,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel: SocialChannel,
    pub total: u64,
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
    pub mean_score: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryQuery {
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

#[derive(Error, Debug)]
pub enum EngagementError {
    #[error("Record not found")]
    NotFound,

    #[error("Invalid status transition from {from} to {to}")]
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
    fn contact_status_flow() {
        assert!(ContactStatus::New.can_transition_to(ContactStatus::Acknowledged));
        assert!(ContactStatus::Acknowledged.can_transition_to(ContactStatus::Resolved));
        assert!(!ContactStatus::Resolved.can_transition_to(ContactStatus::New));
        assert!(!ContactStatus::Spam.can_transition_to(ContactStatus::Acknowledged));
    }

    #[test]
    fn enquiry_status_flow() {
        assert!(EnquiryStatus::Open.can_transition_to(EnquiryStatus::InProgress));
        assert!(EnquiryStatus::InProgress.can_transition_to(EnquiryStatus::Closed));
        assert!(!EnquiryStatus::Closed.can_transition_to(EnquiryStatus::Open));
    }

    #[test]
    fn sentiment_label_thresholds() {
        assert_eq!(SentimentLabel::from_score(0.5), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_score(0.2), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(0.0), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(-0.2), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(-0.21), SentimentLabel::Negative);
    }
}
