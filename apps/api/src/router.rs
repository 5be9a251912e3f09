use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use doctor_cell::router::doctor_routes;
use engagement_cell::router::engagement_routes;
use shared_config::AppConfig;
use video_consult_cell::router::video_consult_routes;
use waitlist_cell::router::waitlist_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/waitlist", waitlist_routes(state.clone()))
        .nest("/consultations", video_consult_routes(state.clone()))
        .nest("/engagement", engagement_routes(state.clone()))
}
