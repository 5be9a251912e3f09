use thiserror::Error;

#[derive(Error, Debug)]
pub enum WaitlistError {
    #[error("Waitlist is not configured (missing REDIS_URL)")]
    NotConfigured,

    #[error("Waitlist entry not found: {0}")]
    NotFound(String),

    #[error("Patient already has an active {0} waitlist entry")]
    DuplicateEntry(String),

    #[error("Invalid waitlist status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Offer is no longer valid: {0}")]
    OfferLapsed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Redis connection error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Queue operation failed: {0}")]
    QueueError(String),
}
