//! HTTP route handlers for the retrieval API.

use crate::error::{Result, RetrievalError};
use crate::server::AppState;
use crate::vector::FeatureVector;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError};
use std::time::Instant;
use tracing::warn;

/// Largest accepted request body (image uploads).
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

// --- Request/Response types ---

#[derive(Deserialize)]
pub struct VectorQueryRequest {
    #[serde(default)]
    pub filename: Option<String>,
    pub vector: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RetrieveResponse {
    /// Name of the uploaded file, echoed back unchanged.
    pub filename: Option<String>,
    pub similar_images: Vec<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub vector_count: usize,
    pub dimension: usize,
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub status: String,
    pub vector_count: usize,
    pub dimension: usize,
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub total_queries: u64,
    pub failed_queries: u64,
    pub total_reloads: u64,
    pub avg_query_latency_us: f64,
    pub p50_query_latency_us: f64,
    pub p95_query_latency_us: f64,
    pub p99_query_latency_us: f64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn status_for(e: &RetrievalError) -> StatusCode {
    match e {
        RetrievalError::DimensionMismatch { .. } | RetrievalError::InvalidArgument { .. } => {
            StatusCode::BAD_REQUEST
        }
        RetrievalError::Extraction { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn from_retrieval(e: RetrievalError) -> ApiError {
    api_error(status_for(&e), e)
}

/// Update metrics for a finished query and convert its error.
fn record_query(
    state: &AppState,
    start: Instant,
    result: Result<Vec<String>>,
) -> std::result::Result<Vec<String>, ApiError> {
    let mut metrics = state.metrics.write().unwrap_or_else(PoisonError::into_inner);
    match result {
        Ok(ids) => {
            metrics.record_query(start.elapsed());
            Ok(ids)
        }
        Err(e) => {
            metrics.record_failure();
            Err(from_retrieval(e))
        }
    }
}

// --- Router ---

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/retrieve/:top_k", post(retrieve_upload))
        .route("/retrieve/:top_k/vector", post(retrieve_vector))
        .route("/admin/reload", post(reload))
        .route("/metrics", get(get_metrics))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

// --- Handlers ---

async fn retrieve_upload(
    State(state): State<Arc<AppState>>,
    Path(top_k): Path<usize>,
    mut multipart: Multipart,
) -> std::result::Result<Json<RetrieveResponse>, ApiError> {
    let extractor = state.extractor.clone().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "no feature extractor configured; POST a vector to /retrieve/{top_k}/vector",
        )
    })?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().map(str::to_owned);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
            upload = Some((filename, bytes));
            break;
        }
    }
    let (filename, bytes) = upload
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "missing multipart field 'file'"))?;

    let start = Instant::now();
    let context = Arc::clone(&state.context);
    let result = tokio::task::spawn_blocking(move || {
        context.retrieve_image(&*extractor, &bytes, top_k)
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    let similar_images = record_query(&state, start, result)?;
    Ok(Json(RetrieveResponse {
        filename,
        similar_images,
    }))
}

async fn retrieve_vector(
    State(state): State<Arc<AppState>>,
    Path(top_k): Path<usize>,
    Json(req): Json<VectorQueryRequest>,
) -> std::result::Result<Json<RetrieveResponse>, ApiError> {
    let start = Instant::now();
    let query = FeatureVector::new(req.vector);
    let result = state.context.retrieve(&query, top_k);

    let similar_images = record_query(&state, start, result)?;
    Ok(Json(RetrieveResponse {
        filename: req.filename,
        similar_images,
    }))
}

async fn reload(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<ReloadResponse>, ApiError> {
    let context = Arc::clone(&state.context);
    let loaded = tokio::task::spawn_blocking(move || context.reload())
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?
        .map_err(|e| {
            warn!(error = %e, "reload failed, keeping current index");
            from_retrieval(e)
        })?;

    state
        .metrics
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .record_reload();

    Ok(Json(ReloadResponse {
        status: "reloaded".to_string(),
        vector_count: loaded.len(),
        dimension: loaded.dimension(),
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let loaded = state.context.snapshot();
    Json(HealthResponse {
        status: "ok".to_string(),
        vector_count: loaded.len(),
        dimension: loaded.dimension(),
    })
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    let metrics = state.metrics.read().unwrap_or_else(PoisonError::into_inner);

    Json(MetricsResponse {
        total_queries: metrics.total_queries(),
        failed_queries: metrics.failed_queries(),
        total_reloads: metrics.total_reloads(),
        avg_query_latency_us: metrics.avg_query_latency_us(),
        p50_query_latency_us: metrics.percentile_query_latency_us(50.0),
        p95_query_latency_us: metrics.percentile_query_latency_us(95.0),
        p99_query_latency_us: metrics.percentile_query_latency_us(99.0),
    })
}
