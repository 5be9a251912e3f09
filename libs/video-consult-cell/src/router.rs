use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn video_consult_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_consultation))
        .route("/mine", get(handlers::list_my_consultations))
        .route("/appointment/{appointment_id}", get(handlers::get_for_appointment))
        .route("/{consultation_id}/join", post(handlers::join_consultation))
        .route("/{consultation_id}/complete", post(handlers::complete_consultation))
        .route("/{consultation_id}/cancel", post(handlers::cancel_consultation))
        .route("/sweep-no-shows", post(handlers::sweep_no_shows))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
