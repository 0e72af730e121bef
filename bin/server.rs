// Real Estate Dashboard - Web Server
// Every request re-runs load → render, so the page always reflects the CSV on disk

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use realestate_dashboard::{
    init_tracing, iqr_bounds, render_from_config, render_html, CliArgs, DashboardConfig, Page, StatsError,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
struct AppState {
    config: Arc<DashboardConfig>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Serialize)]
struct BoundsResponse {
    dataset: String,
    column: String,
    lower: f64,
    upper: f64,
}

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::err(message))).into_response()
}

/// Load and render off the async runtime; the CSV is read fresh each time.
async fn build_page(config: Arc<DashboardConfig>) -> Result<Page> {
    tokio::task::spawn_blocking(move || render_from_config(&config))
        .await
        .context("Render task panicked")?
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET / - Dashboard page
async fn serve_index(State(state): State<AppState>) -> Response {
    match build_page(state.config.clone()).await {
        Ok(page) => Html(render_html(&page)).into_response(),
        Err(e) => {
            error!("Error rendering dashboard: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!(
                    "<h1>Dashboard unavailable</h1><pre>{}</pre>",
                    format!("{:#}", e)
                        .replace('&', "&amp;")
                        .replace('<', "&lt;")
                        .replace('>', "&gt;")
                )),
            )
                .into_response()
        }
    }
}

/// GET /api/page - Page model as JSON
async fn get_page(State(state): State<AppState>) -> Response {
    match build_page(state.config.clone()).await {
        Ok(page) => Json(ApiResponse::ok(page)).into_response(),
        Err(e) => {
            error!("Error rendering page: {:#}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        }
    }
}

/// GET /api/bounds/:column - IQR fences of a column, per dataset
async fn get_bounds(State(state): State<AppState>, Path(column): Path<String>) -> Response {
    let config = state.config.clone();
    let col = column.clone();

    let result = tokio::task::spawn_blocking(move || -> Result<Result<Vec<BoundsResponse>, StatsError>> {
        let datasets = config.load_datasets()?;
        Ok(datasets
            .iter()
            .map(|ds| {
                iqr_bounds(&ds.table, &col).map(|(lower, upper)| BoundsResponse {
                    dataset: ds.name.clone(),
                    column: col.clone(),
                    lower,
                    upper,
                })
            })
            .collect())
    })
    .await;

    match result {
        Ok(Ok(Ok(bounds))) => Json(ApiResponse::ok(bounds)).into_response(),
        Ok(Ok(Err(e @ StatsError::ColumnNotFound(_)))) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        Ok(Ok(Err(e @ StatsError::NotNumeric(_)))) => api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        Ok(Ok(Err(e @ StatsError::Frame(_)))) => {
            error!("Bounds of {} failed: {}", column, e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Ok(Err(e)) => {
            error!("Error loading datasets for bounds of {}: {:#}", column, e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        }
        Err(e) => {
            error!("Bounds task failed: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/page", get(get_page))
        .route("/bounds/:column", get(get_bounds))
        .with_state(state.clone());

    Router::new()
        .route("/", get(serve_index))
        .with_state(state)
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = CliArgs::parse(std::env::args().skip(1))?;
    let config = args.resolve()?;

    for source in &config.datasets {
        if !source.path.exists() {
            // Not fatal: each request retries the load
            tracing::warn!(path = %source.path.display(), "dataset file not found yet");
        }
    }

    let addr = config.addr.clone();
    let state = AppState {
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Server running on http://{}", addr);
    info!("API: http://{}/api/page", addr);

    axum::serve(listener, app(state))
        .await
        .context("Server error")?;

    Ok(())
}
