use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/search", get(handlers::search_doctors_public))
        .route("/{doctor_id}", get(handlers::get_doctor_public))
        .route("/{doctor_id}/availability", get(handlers::list_availability_public))
        .route("/{doctor_id}/available-slots", get(handlers::get_available_slots_public));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        // Doctor profile management
        .route("/", post(handlers::create_doctor))
        .route("/{doctor_id}", put(handlers::update_doctor))
        .route("/{doctor_id}/verify", patch(handlers::verify_doctor))
        // Availability management
        .route("/{doctor_id}/availability", post(handlers::create_availability))
        .route(
            "/{doctor_id}/availability/{availability_id}",
            put(handlers::update_availability),
        )
        .route(
            "/{doctor_id}/availability/{availability_id}",
            delete(handlers::delete_availability),
        )
        .route(
            "/{doctor_id}/availability-overrides",
            post(handlers::create_availability_override),
        )
        // Recommendations
        .route("/recommendations", post(handlers::recommend_doctors))
        .route("/recommendations/best", post(handlers::best_doctor))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
