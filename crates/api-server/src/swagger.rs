//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shopdash API",
        version = "0.1.0",
        description = "Product catalog with a cached dashboard summary.\n\nThe dashboard is cache-aside with a distributed lock against stampedes; catalog writes invalidate it across instances.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Dashboard", description = "Aggregated catalog summary, served from cache"),
        (name = "Products", description = "Product and review management"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        // Dashboard
        crate::rest::get_dashboard,
        // Products
        crate::rest::list_products,
        crate::rest::get_product,
        crate::rest::create_product,
        crate::rest::update_product,
        crate::rest::delete_product,
        crate::rest::add_review,
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        // Dashboard types
        shopdash_core::types::DashboardSnapshot,
        shopdash_core::types::DashboardStats,
        shopdash_core::types::RecentReview,
        shopdash_core::types::ProductRef,
        // Catalog types
        shopdash_core::types::Product,
        shopdash_core::types::Review,
        shopdash_core::types::ProductInput,
        shopdash_core::types::ReviewInput,
        // REST envelope types
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
        crate::rest::DeleteResponse,
    ))
)]
pub struct ApiDoc;
