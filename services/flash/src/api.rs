use crate::config::ApiConfig;
use crate::error::FlashError;
use crate::model::{Flash, Metric};
use crate::reader::MetricReader;
use crate::store::DocumentStore;
use crate::writer::FlashSaleWriter;
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub writer: Arc<FlashSaleWriter>,
    pub reader: Arc<MetricReader>,
    pub max_batch_size: usize,
}

/// Response for a stored flash sale batch
#[derive(Debug, Serialize, Deserialize)]
pub struct FlashSaleResponse {
    pub flash_id: Uuid,
    pub inserted: Vec<Uuid>,
}

/// Query parameters for threshold search
#[derive(Debug, Deserialize)]
pub struct ThresholdQuery {
    /// Minimum ethylene level (inclusive)
    pub ethylene: f64,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    /// Offending field for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Batch position where processing stopped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

impl From<&FlashError> for ErrorResponse {
    fn from(err: &FlashError) -> Self {
        let field = match err {
            FlashError::Validation { field, .. } => Some(field.to_string()),
            _ => None,
        };

        Self {
            error: err.to_string(),
            code: err.code().to_string(),
            field,
            index: err.batch_index(),
        }
    }
}

fn status_for(err: &FlashError) -> StatusCode {
    match err {
        FlashError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FlashError::NotFound { .. } => StatusCode::NOT_FOUND,
        FlashError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: FlashError) -> ApiError {
    (status_for(&err), Json(ErrorResponse::from(&err)))
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/api/v1/flash-sales", post(add_flash_sale))
        .route("/api/v1/metrics/threshold", get(search_threshold))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "flash-service"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.writer.handle().client().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

/// Validate and store a flash sale batch
#[instrument(skip_all)]
async fn add_flash_sale(
    State(state): State<AppState>,
    Json(records): Json<Vec<Flash>>,
) -> Result<(StatusCode, Json<FlashSaleResponse>), ApiError> {
    if records.len() > state.max_batch_size {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Maximum {} records per batch", state.max_batch_size),
                code: "BATCH_TOO_LARGE".to_string(),
                field: None,
                index: None,
            }),
        ));
    }

    let receipt = state.writer.write_batch(records).await.map_err(|e| {
        match &e {
            FlashError::Validation { .. } => warn!(error = %e, "Flash sale batch rejected"),
            _ => error!(error = %e, "Failed to store flash sale batch"),
        }
        api_error(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(FlashSaleResponse {
            flash_id: receipt.flash_id,
            inserted: receipt.inserted.iter().map(|r| r.inserted_id).collect(),
        }),
    ))
}

/// Metrics at or above an ethylene threshold
#[instrument(skip_all, fields(ethylene = params.ethylene))]
async fn search_threshold(
    State(state): State<AppState>,
    Query(params): Query<ThresholdQuery>,
) -> Result<Json<Vec<Metric>>, ApiError> {
    let metrics = state
        .reader
        .search_met_threshold(params.ethylene)
        .await
        .map_err(|e| {
            if !matches!(e, FlashError::NotFound { .. }) {
                error!(error = %e, "Failed to search metrics");
            }
            api_error(e)
        })?;

    Ok(Json(metrics))
}

/// Start the flash sale API server
pub async fn start_api_server(state: AppState, config: &ApiConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting flash sale API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}
