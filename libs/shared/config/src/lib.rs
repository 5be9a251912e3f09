use std::env;
use tracing::warn;

// Default clinic site used when a doctor record carries no coordinates.
const DEFAULT_CLINIC_LATITUDE: f64 = 1.3521;
const DEFAULT_CLINIC_LONGITUDE: f64 = 103.8198;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub redis_url: Option<String>,
    pub clinic_latitude: f64,
    pub clinic_longitude: f64,
    pub waitlist_offer_ttl_minutes: i64,
    pub video_join_lead_minutes: i64,
    pub video_token_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: required_var("SUPABASE_URL"),
            supabase_anon_key: required_var("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_jwt_secret: required_var("SUPABASE_JWT_SECRET"),
            redis_url: env::var("REDIS_URL").ok(),
            clinic_latitude: parsed_var("CLINIC_LATITUDE", DEFAULT_CLINIC_LATITUDE),
            clinic_longitude: parsed_var("CLINIC_LONGITUDE", DEFAULT_CLINIC_LONGITUDE),
            waitlist_offer_ttl_minutes: parsed_var("WAITLIST_OFFER_TTL_MINUTES", 120),
            video_join_lead_minutes: parsed_var("VIDEO_JOIN_LEAD_MINUTES", 15),
            video_token_secret: required_var("VIDEO_TOKEN_SECRET"),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }
        if !config.is_waitlist_configured() {
            warn!("REDIS_URL not set - waitlist matching is disabled");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_waitlist_configured(&self) -> bool {
        self.redis_url.as_deref().map(|url| !url.is_empty()).unwrap_or(false)
    }

    pub fn is_video_configured(&self) -> bool {
        !self.video_token_secret.is_empty()
    }
}

fn required_var(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", name);
        String::new()
    })
}

fn parsed_var<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid value, using default", name);
            default
        }),
        Err(_) => default,
    }
}
