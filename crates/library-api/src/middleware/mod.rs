//! Tower middleware for the HTTP surface.
//!
//! Layer order in [`crate::http::create_router`], outermost first: request id,
//! metrics, logging. The request id therefore exists before anything logs it.

mod logging;
mod metrics;
mod request_id;

pub use logging::RequestLoggingLayer;
pub use metrics::{MetricsLayer, RequestMetrics};
pub use request_id::{RequestId, RequestIdLayer, REQUEST_ID_HEADER};

use tower_http::cors::{Any, CorsLayer};

/// Permissive CORS for browser clients of the API.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
}
