pub mod catalog;
pub mod downloads;
pub mod error;
pub mod files;
pub mod handlers;
pub mod lifecycle;
pub mod middleware;
pub mod routes;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
