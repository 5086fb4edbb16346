//! Prometheus exposition.
//!
//! Recorded series:
//!
//! - `library_http_requests_total`, `library_http_request_duration_seconds`
//! - `library_loader_batches_total`, `library_loader_keys_total`,
//!   `library_loader_cache_hits_total`
//! - `library_events_published_total`

use std::sync::Arc;

use axum::{extract::State, http::header::CONTENT_TYPE, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Handle used by the `/metrics` route to render the registry.
#[derive(Clone)]
pub struct MetricsState {
    handle: Arc<PrometheusHandle>,
}

impl MetricsState {
    pub fn new(handle: PrometheusHandle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to install Prometheus recorder: recorder already installed")]
    AlreadyInstalled,
}

/// Installs the global Prometheus recorder.
///
/// # Errors
///
/// Fails when a recorder is already installed in this process.
pub fn init_metrics() -> Result<MetricsState, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|_| MetricsError::AlreadyInstalled)?;

    describe_metrics();

    Ok(MetricsState::new(handle))
}

fn describe_metrics() {
    metrics::describe_counter!("library_http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "library_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "library_loader_batches_total",
        "Batch functions invoked by request loaders"
    );
    metrics::describe_counter!(
        "library_loader_keys_total",
        "Keys fetched through batch functions"
    );
    metrics::describe_counter!(
        "library_loader_cache_hits_total",
        "Loads answered from a loader's per-request cache"
    );

    metrics::describe_counter!(
        "library_events_published_total",
        "Events delivered to subscribers, by topic"
    );
}

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], state.render())
}
