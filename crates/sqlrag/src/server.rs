//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/query` | `{"question": "..."}` → the two-key pipeline output |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "processing", "message": "sql execution failed: no such table: sales" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `validation` | 400 |
//! | `provider_bad_request` | 400 |
//! | `processing` | 500 |
//! | `unavailable` | 503 (index or database could not be reached) |
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use sqlrag_core::models::PipelineOutput;
use sqlrag_core::PipelineError;

use crate::config::Config;
use crate::factory::{ConfiguredPipelines, PipelineFactory};

#[derive(Clone)]
struct AppState {
    pipelines: Arc<dyn PipelineFactory>,
}

/// Start the server on `[server].bind` and run until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pipelines = Arc::new(ConfiguredPipelines::new(config.clone())?);
    let app = router(pipelines);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("sqlrag server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router. Exposed so tests can serve it with a fake factory.
pub fn router(pipelines: Arc<dyn PipelineFactory>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { pipelines })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let status = match err {
            PipelineError::Processing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Validation(_) | PipelineError::ProviderBadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<PipelineOutput>, AppError> {
    let pipeline = state.pipelines.build().await.map_err(|e| {
        error!("failed to set up pipeline: {:#}", e);
        AppError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "unavailable".to_string(),
            message: format!("{:#}", e),
        }
    })?;

    // A dropped request must not cancel the run before it releases its resources.
    let question = req.question;
    let output = tokio::spawn(async move { pipeline.run(&question).await })
        .await
        .map_err(|e| AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "processing".to_string(),
            message: format!("pipeline task failed: {}", e),
        })??;
    Ok(Json(output))
}
