use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn engagement_routes(state: Arc<AppConfig>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/contact", post(handlers::submit_contact_form))
        .route("/enquiries", post(handlers::submit_enquiry));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/contact", get(handlers::list_contact_forms))
        .route("/contact/{form_id}/status", patch(handlers::update_contact_status))
        .route("/enquiries/mine", post(handlers::submit_patient_enquiry))
        .route("/enquiries", get(handlers::list_enquiries))
        .route("/enquiries/{enquiry_id}/status", patch(handlers::update_enquiry_status))
        .route("/social/mentions", post(handlers::ingest_mention))
        .route("/social/mentions", get(handlers::list_mentions))
        .route("/social/summary", get(handlers::channel_summary))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
