//! Scheduler-facing HTTP server
//!
//! The external scheduler POSTs to `/detect` to run one pass and gets the
//! counters back. A liveness probe lives at `/health`. CORS preflight is
//! accepted so hosted schedulers and dashboards can call across origins.

use crate::detector::{DetectorService, PassCounters};
use crate::error::EdgelineError;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub struct AppState {
    pub service: Arc<DetectorService>,
    pub started_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct DetectResponse {
    success: bool,
    #[serde(flatten)]
    counters: PassCounters,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    uptime_seconds: i64,
    database: &'static str,
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/detect", post(run_detection))
        .route("/health", get(health))
        .layer(build_cors_layer())
        .with_state(state)
}

async fn run_detection(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.service.run_pass().await {
        Ok(counters) => (
            StatusCode::OK,
            Json(DetectResponse {
                success: true,
                counters,
                error: None,
            }),
        ),
        Err(e) => {
            error!("Detection pass failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DetectResponse {
                    success: false,
                    counters: PassCounters::default(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_ok = state.service.store().ping().await.is_ok();
    let response = HealthResponse {
        status: if db_ok { "healthy" } else { "degraded" },
        timestamp: Utc::now(),
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        database: if db_ok { "connected" } else { "unreachable" },
    };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}

/// Bind and serve until the process is stopped
pub async fn serve(state: Arc<AppState>, port: u16) -> crate::error::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, create_router(state))
        .await
        .map_err(|e| EdgelineError::Internal(format!("HTTP server error: {}", e)))?;
    Ok(())
}
