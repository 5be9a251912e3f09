pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::*;
pub use models::*;
pub use router::waitlist_routes;
pub use services::matcher::{MatcherSettings, WaitlistMatcher};
pub use services::store::WaitlistStore;
