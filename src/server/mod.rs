//! HTTP API for image retrieval.

pub mod routes;

use crate::features::FeatureExtractor;
use crate::metrics::MetricsCollector;
use crate::service::ServiceContext;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Shared application state for the HTTP server.
pub struct AppState {
    pub context: Arc<ServiceContext>,
    /// Needed for image uploads; vector queries work without one.
    pub extractor: Option<Arc<dyn FeatureExtractor>>,
    pub metrics: RwLock<MetricsCollector>,
}

impl AppState {
    pub fn new(context: ServiceContext, extractor: Option<Arc<dyn FeatureExtractor>>) -> Self {
        Self {
            context: Arc::new(context),
            extractor,
            metrics: RwLock::new(MetricsCollector::new()),
        }
    }
}

/// Bind `addr` and serve until the process is stopped.
pub async fn start(addr: &str, state: AppState) -> anyhow::Result<()> {
    let snapshot = state.context.snapshot();
    let app = routes::create_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        vectors = snapshot.len(),
        dimension = snapshot.dimension(),
        "server listening"
    );
    drop(snapshot);
    axum::serve(listener, app).await?;
    Ok(())
}
