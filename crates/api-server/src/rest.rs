//! REST handlers for the dashboard summary, catalog writes and probes.
//!
//! Every successful product or review write invalidates the dashboard
//! before the response is sent. Failed writes leave the cache alone.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use shopdash_catalog::CatalogStore;
use shopdash_core::types::{Product, ProductInput, Review, ReviewInput};
use shopdash_core::{DashboardSnapshot, ShopdashError};
use shopdash_dashboard::DashboardAggregator;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};
use utoipa::ToSchema;

/// Response header reporting whether the dashboard came from the cache.
pub const CACHE_HEADER: &str = "x-cache";

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<DashboardAggregator>,
    pub catalog: Arc<CatalogStore>,
    pub node_id: String,
    pub start_time: Instant,
}

/// Maps domain errors onto HTTP responses at the edge.
pub struct ApiError(ShopdashError);

impl From<ShopdashError> for ApiError {
    fn from(err: ShopdashError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self.0 {
            ShopdashError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ShopdashError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let message = if status.is_server_error() {
            error!(error = %self.0, "Request failed");
            metrics::counter!("api.errors").increment(1);
            "Internal processing error".to_string()
        } else {
            warn!(error = %self.0, "Request rejected");
            self.0.to_string()
        };

        (
            status,
            Json(ErrorResponse {
                error: code.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

/// GET /api/dashboard: Cached dashboard summary.
#[utoipa::path(
    get,
    path = "/api/dashboard",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Dashboard summary; X-Cache reports HIT or MISS", body = DashboardSnapshot),
        (status = 500, description = "Catalog unavailable", body = ErrorResponse),
    )
)]
pub async fn get_dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let fetch = state.dashboard.fetch().await?;
    let cache_status = if fetch.resolution.is_cache_hit() {
        "HIT"
    } else {
        "MISS"
    };
    metrics::counter!("api.dashboard.requests", "resolution" => fetch.resolution.as_str())
        .increment(1);
    Ok(([(CACHE_HEADER, cache_status)], Json(fetch.snapshot)))
}

/// GET /api/products: All products with their reviews.
#[utoipa::path(
    get,
    path = "/api/products",
    tag = "Products",
    responses(
        (status = 200, description = "All products", body = Vec<Product>),
    )
)]
pub async fn list_products(State(state): State<AppState>) -> Json<Vec<Product>> {
    Json(state.catalog.list_products())
}

/// GET /api/products/{id}
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "Products",
    params(
        ("id" = i64, Path, description = "Product identifier"),
    ),
    responses(
        (status = 200, description = "Product with reviews", body = Product),
        (status = 404, description = "Product not found", body = ErrorResponse),
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.catalog.get_product(id)?))
}

/// POST /api/products: Create a product, then invalidate the dashboard.
#[utoipa::path(
    post,
    path = "/api/products",
    tag = "Products",
    request_body = ProductInput,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, description = "Invalid product", body = ErrorResponse),
    )
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.catalog.create_product(input)?;
    state.dashboard.invalidate_dashboard().await;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/products/{id}: Partial update, then invalidate the dashboard.
#[utoipa::path(
    put,
    path = "/api/products/{id}",
    tag = "Products",
    params(
        ("id" = i64, Path, description = "Product identifier"),
    ),
    request_body = ProductInput,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 400, description = "Invalid product", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse),
    )
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, ApiError> {
    let product = state.catalog.update_product(id, input)?;
    state.dashboard.invalidate_dashboard().await;
    Ok(Json(product))
}

/// DELETE /api/products/{id}: Delete, then invalidate the dashboard.
#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    tag = "Products",
    params(
        ("id" = i64, Path, description = "Product identifier"),
    ),
    responses(
        (status = 200, description = "Product deleted", body = DeleteResponse),
        (status = 404, description = "Product not found", body = ErrorResponse),
    )
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let removed = state.catalog.delete_product(id)?;
    state.dashboard.invalidate_dashboard().await;
    Ok(Json(DeleteResponse {
        success: true,
        id: removed.id,
    }))
}

/// POST /api/products/{id}/reviews: Add a review, then invalidate the
/// dashboard (recent reviews are part of it).
#[utoipa::path(
    post,
    path = "/api/products/{id}/reviews",
    tag = "Products",
    params(
        ("id" = i64, Path, description = "Product identifier"),
    ),
    request_body = ReviewInput,
    responses(
        (status = 201, description = "Review added", body = Review),
        (status = 400, description = "Invalid review", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse),
    )
)]
pub async fn add_review(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let review = state.catalog.add_review(id, input)?;
    state.dashboard.invalidate_dashboard().await;
    Ok((StatusCode::CREATED, Json(review)))
}

/// GET /health: Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready: Readiness probe.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses(
        (status = 200, description = "Ready to serve"),
    )
)]
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /live: Liveness probe.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses(
        (status = 200, description = "Process is alive"),
    )
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
    pub id: i64,
}
