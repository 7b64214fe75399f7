//! Read-only HTTP API over the warehouse.
//!
//! - `GET /api/fees?timestamp_ms=<epoch ms>`: fee summary of the UTC day
//!   containing the timestamp, or of today when it is omitted.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tidemark_engine::{daily_fee_summary, open_warehouse, DailyFees, UtcDay};
use tidemark_sdk::warehouse::Warehouse;
use tidemark_types::row::FEE_TOTAL;
use tidemark_types::watermark::now_millis;

type AppState = Arc<dyn Warehouse>;

/// Execute the `serve` command: bind the API and serve until Ctrl-C.
pub async fn execute(pipeline_path: &Path, port: u16) -> Result<()> {
    let config = super::load_pipeline(pipeline_path)?;
    let warehouse = open_warehouse(&config.destination)?;
    warehouse
        .ensure_table(&FEE_TOTAL)
        .await
        .context("Failed to prepare fee table")?;

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, "Fee API listening");
    println!("Serving http://{local}/api/fees");

    axum::serve(listener, router(warehouse))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down fee API");
        })
        .await?;
    Ok(())
}

/// Build the router (separated for testing).
pub fn router(warehouse: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/fees", get(fees))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(warehouse)
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct FeesResponse {
    success: bool,
    data: Option<DailyFees>,
    metadata: FeesMetadata,
}

#[derive(Debug, Serialize)]
struct FeesMetadata {
    date: String,
    timestamp_ms: i64,
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal Server Error", "message": message })),
            )
                .into_response(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" })))
}

/// The requested day, and the instant echoed back in `metadata`.
fn requested_day(raw: Option<&str>) -> Result<(UtcDay, i64), ApiError> {
    let invalid = || ApiError::BadRequest("timestamp_ms must be a valid number".to_string());
    match raw.filter(|s| !s.is_empty()) {
        None => {
            let now = now_millis();
            let day = UtcDay::containing(now)
                .ok_or_else(|| ApiError::Internal("clock out of range".to_string()))?;
            Ok((day, now))
        }
        Some(raw) => {
            if !raw.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let ms: i64 = raw.parse().map_err(|_| invalid())?;
            let day = UtcDay::containing(ms).ok_or_else(|| {
                ApiError::BadRequest("Invalid timestamp_ms format".to_string())
            })?;
            let start = day.start_ms;
            Ok((day, start))
        }
    }
}

async fn fees(
    State(warehouse): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<FeesResponse>, ApiError> {
    let (day, echoed_ms) = requested_day(params.get("timestamp_ms").map(String::as_str))?;
    let data = daily_fee_summary(warehouse.as_ref(), &day)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, date = day.date.as_str(), "Fee summary query failed");
            ApiError::Internal(e.to_string())
        })?;
    Ok(Json(FeesResponse {
        success: true,
        data,
        metadata: FeesMetadata {
            date: day.date,
            timestamp_ms: echoed_ms,
        },
    }))
}
