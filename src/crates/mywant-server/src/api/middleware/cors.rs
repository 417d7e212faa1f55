//! CORS middleware configuration.

use tower_http::cors::CorsLayer;

/// Permissive CORS, suitable for local collaborators (the CLI, a browser
/// dashboard) talking to the control plane.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}
