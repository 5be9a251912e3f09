use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq)]
pub struct RoomTokenClaims {
    pub room_name: String,
    pub user_id: String,
    pub role: String,
    pub expires_at: i64,
}

/// Issues and checks HMAC-signed room entry tokens. The payload is
/// `room:user:role:expiry` so a token is only good for one participant
/// in one room.
pub struct RoomTokenSigner {
    secret: String,
}

impl RoomTokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
        }
    }

    pub fn sign(
        &self,
        room_name: &str,
        user_id: &str,
        role: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<String, String> {
        if self.secret.is_empty() {
            return Err("Video token secret is not set".to_string());
        }

        let payload = format!("{}:{}:{}:{}", room_name, user_id, role, expires_at.timestamp());

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| "Failed to create HMAC".to_string())?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    pub fn verify(&self, token: &str) -> Result<RoomTokenClaims, String> {
        if self.secret.is_empty() {
            return Err("Video token secret is not set".to_string());
        }

        let (payload_b64, signature_b64) = token
            .split_once('.')
            .ok_or_else(|| "Invalid token format".to_string())?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| "Invalid token encoding".to_string())?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| "Invalid signature encoding".to_string())?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| "Failed to create HMAC".to_string())?;
        mac.update(&payload_bytes);
        if mac.verify_slice(&signature).is_err() {
            debug!("Room token signature verification failed");
            return Err("Invalid token signature".to_string());
        }

        let payload =
            String::from_utf8(payload_bytes).map_err(|_| "Invalid token encoding".to_string())?;
        let parts: Vec<&str> = payload.split(':').collect();
        if parts.len() != 4 {
            return Err("Invalid token payload".to_string());
        }

        let expires_at: i64 = parts[3]
            .parse()
            .map_err(|_| "Invalid token expiry".to_string())?;
        if expires_at < Utc::now().timestamp() {
            return Err("Token expired".to_string());
        }

        Ok(RoomTokenClaims {
            room_name: parts[0].to_string(),
            user_id: parts[1].to_string(),
            role: parts[2].to_string(),
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_round_trip() {
        let signer = RoomTokenSigner::new("room-secret");
        let expires = Utc::now() + Duration::minutes(30);

        let token = signer.sign("consult-abc", "user-1", "patient", expires).unwrap();
        let claims = signer.verify(&token).unwrap();

        assert_eq!(claims.room_name, "consult-abc");
        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.role, "patient");
        assert_eq!(claims.expires_at, expires.timestamp());
    }

    #[test]
    fn expired_token_rejected() {
        let signer = RoomTokenSigner::new("room-secret");
        let expired = Utc::now() - Duration::minutes(1);

        let token = signer.sign("consult-abc", "user-1", "patient", expired).unwrap();
        assert_eq!(signer.verify(&token).unwrap_err(), "Token expired");
    }

    #[test]
    fn tampered_token_rejected() {
        let signer = RoomTokenSigner::new("room-secret");
        let expires = Utc::now() + Duration::minutes(30);

        let token = signer.sign("consult-abc", "user-1", "patient", expires).unwrap();
        let (_, signature) = token.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(format!(
            "consult-abc:user-2:doctor:{}",
            expires.timestamp()
        ));
        let forged = format!("{}.{}", forged_payload, signature);

        assert_eq!(signer.verify(&forged).unwrap_err(), "Invalid token signature");
    }

    #[test]
    fn wrong_secret_rejected() {
        let signer = RoomTokenSigner::new("room-secret");
        let other = RoomTokenSigner::new("other-secret");
        let expires = Utc::now() + Duration::minutes(30);

        let token = signer.sign("consult-abc", "user-1", "patient", expires).unwrap();
        assert!(other.verify(&token).is_err());
    }
}
