//! Catalog records and the dashboard summary computed from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of products carried in `DashboardSnapshot::top_rated`.
pub const TOP_RATED_LIMIT: usize = 3;

/// Number of reviews carried in `DashboardSnapshot::recent_reviews`.
pub const RECENT_REVIEWS_LIMIT: usize = 6;

/// A catalog product together with its reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: f64,
    pub discount_percentage: Option<f64>,
    pub rating: f64,
    pub stock: i64,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i64,
    pub product_id: i64,
    pub rating: u8,
    pub comment: String,
    pub date: DateTime<Utc>,
    pub reviewer_name: String,
    pub reviewer_email: String,
}

/// Denormalized product reference carried by recent reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub id: i64,
    pub title: String,
    pub thumbnail: Option<String>,
}

/// A review as shown in the "recent reviews" feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentReview {
    pub id: i64,
    pub product_id: i64,
    pub rating: u8,
    pub comment: String,
    pub date: DateTime<Utc>,
    pub reviewer_name: String,
    pub reviewer_email: String,
    pub product: ProductRef,
}

impl RecentReview {
    pub fn new(review: &Review, product: ProductRef) -> Self {
        Self {
            id: review.id,
            product_id: review.product_id,
            rating: review.rating,
            comment: review.comment.clone(),
            date: review.date,
            reviewer_name: review.reviewer_name.clone(),
            reviewer_email: review.reviewer_email.clone(),
            product,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_products: u64,
    pub total_stock: u64,
    pub avg_price: f64,
    pub avg_rating: f64,
}

/// Dashboard summary. Produced whole by one computation and cached whole;
/// never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub stats: DashboardStats,
    pub top_rated: Vec<Product>,
    pub recent_reviews: Vec<RecentReview>,
}

impl DashboardSnapshot {
    pub fn empty() -> Self {
        Self {
            stats: DashboardStats {
                total_products: 0,
                total_stock: 0,
                avg_price: 0.0,
                avg_rating: 0.0,
            },
            top_rated: Vec::new(),
            recent_reviews: Vec::new(),
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub rating: u8,
    pub comment: String,
    /// Defaults to the time the review is stored.
    pub date: Option<DateTime<Utc>>,
    pub reviewer_name: String,
    pub reviewer_email: String,
}

/// Product create/update payload. On update, absent fields keep their
/// current values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub rating: Option<f64>,
    pub stock: Option<i64>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub thumbnail: Option<String>,
    /// Reviews created together with a new product.
    #[serde(default)]
    pub reviews: Vec<ReviewInput>,
    /// Reviews appended on update.
    #[serde(default)]
    pub reviews_to_add: Vec<ReviewInput>,
}
