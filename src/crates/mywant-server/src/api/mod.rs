//! HTTP control plane: routes, handlers, and the DTOs between them.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use routes::{create_router, AppState};
