use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn waitlist_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/join", post(handlers::join_waitlist))
        .route("/mine", get(handlers::list_my_entries))
        .route("/stats", get(handlers::get_stats))
        .route("/{entry_id}", get(handlers::get_entry))
        .route("/{entry_id}/cancel", post(handlers::cancel_entry))
        .route("/{entry_id}/accept", post(handlers::accept_offer))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
