use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{EngagementError, Enquiry, EnquiryStatus, SubmitEnquiryRequest};
use crate::services::triage::{classify_topic, route_team};

pub struct EnquiryService {
    supabase: SupabaseClient,
}

impl EnquiryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// File an enquiry, classifying and routing it when no topic is given.
    pub async fn submit(
        &self,
        patient_id: Option<Uuid>,
        request: SubmitEnquiryRequest,
    ) -> Result<Enquiry, EngagementError> {
        if request.message.trim().is_empty() {
            return Err(EngagementError::Validation("Message is required".to_string()));
        }

        let topic = request
            .topic
            .unwrap_or_else(|| classify_topic(&request.message));
        let routed_to = route_team(topic);

        let enquiry_data = json!({
            "patient_id": patient_id,
            "channel": request.channel,
            "topic": topic,
            "message": request.message,
            "routed_to": routed_to,
            "status": EnquiryStatus::Open,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let enquiry: Enquiry = self
            .supabase
            .insert_returning("/rest/v1/enquiries", None, enquiry_data)
            .await
            .map_err(|e| EngagementError::Database(e.to_string()))?;

        info!(
            "Enquiry {} filed under {} and routed to {}",
            enquiry.id, enquiry.topic, enquiry.routed_to
        );
        Ok(enquiry)
    }

    pub async fn list(
        &self,
        status: Option<EnquiryStatus>,
        auth_token: &str,
    ) -> Result<Vec<Enquiry>, EngagementError> {
        let mut path = String::from("/rest/v1/enquiries?select=*&order=created_at.desc&limit=100");
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| EngagementError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| EngagementError::Database(e.to_string()))
            })
            .collect()
    }

    pub async fn update_status(
        &self,
        enquiry_id: &Uuid,
        target: EnquiryStatus,
        auth_token: &str,
    ) -> Result<Enquiry, EngagementError> {
        let current = self.get(enquiry_id, auth_token).await?;

        if !current.status.can_transition_to(target) {
            return Err(EngagementError::InvalidTransition {
                from: current.status.to_string(),
                to: target.to_string(),
            });
        }

        let path = format!("/rest/v1/enquiries?id=eq.{}", enquiry_id);
        let updated: Enquiry = self
            .supabase
            .update_returning(
                &path,
                Some(auth_token),
                json!({
                    "status": target,
                    "updated_at": Utc::now().to_rfc3339()
                }),
            )
            .await
            .map_err(|e| EngagementError::Database(e.to_string()))?;

        debug!("Enquiry {} moved to {}", enquiry_id, target);
        Ok(updated)
    }

    async fn get(&self, enquiry_id: &Uuid, auth_token: &str) -> Result<Enquiry, EngagementError> {
        let path = format!("/rest/v1/enquiries?id=eq.{}", enquiry_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| EngagementError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(EngagementError::NotFound)?;
        serde_json::from_value(row).map_err(|e| EngagementError::Database(e.to_string()))
    }
}
