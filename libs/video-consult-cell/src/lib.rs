pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::video_consult_routes;
pub use services::session::SessionService;
