use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{ContactForm, ContactStatus, EngagementError, SubmitContactRequest};
use crate::services::triage::is_valid_email;

pub struct ContactService {
    supabase: SupabaseClient,
}

impl ContactService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Public submission endpoint; no authentication, strict validation.
    pub async fn submit(
        &self,
        request: SubmitContactRequest,
    ) -> Result<ContactForm, EngagementError> {
        if request.name.trim().is_empty() {
            return Err(EngagementError::Validation("Name is required".to_string()));
        }
        if !is_valid_email(&request.email) {
            return Err(EngagementError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        if request.subject.trim().is_empty() {
            return Err(EngagementError::Validation("Subject is required".to_string()));
        }
        if request.message.trim().is_empty() {
            return Err(EngagementError::Validation("Message is required".to_string()));
        }
        if request.message.len() > 5000 {
            return Err(EngagementError::Validation(
                "Message must be under 5000 characters".to_string(),
            ));
        }

        let form_data = json!({
            "name": request.name,
            "email": request.email,
            "phone": request.phone,
            "subject": request.subject,
            "message": request.message,
            "status": ContactStatus::New,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let form: ContactForm = self
            .supabase
            .insert_returning("/rest/v1/contact_forms", None, form_data)
            .await
            .map_err(|e| EngagementError::Database(e.to_string()))?;

        info!("Contact form {} submitted", form.id);
        Ok(form)
    }

    pub async fn list(
        &self,
        status: Option<ContactStatus>,
        auth_token: &str,
    ) -> Result<Vec<ContactForm>, EngagementError> {
        let mut path = String::from("/rest/v1/contact_forms?select=*&order=created_at.desc&limit=100");
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
        form_id: &Uuid,
        target: ContactStatus,
        auth_token: &str,
    ) -> Result<ContactForm, EngagementError> {
        let current = self.get(form_id, auth_token).await?;

        if !current.status.can_transition_to(target) {
            return Err(EngagementError::InvalidTransition {
                from: current.status.to_string(),
                to: target.to_string(),
            });
        }

        let path = format!("/rest/v1/contact_forms?id=eq.{}", form_id);
        let updated: ContactForm = self
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

        debug!("Contact form {} moved to {}", form_id, target);
        Ok(updated)
    }

    async fn get(&self, form_id: &Uuid, auth_token: &str) -> Result<ContactForm, EngagementError> {
        let path = format!("/rest/v1/contact_forms?id=eq.{}", form_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| EngagementError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(EngagementError::NotFound)?;
        serde_json::from_value(row).map_err(|e| EngagementError::Database(e.to_string()))
    }
}
