//! In-process catalog of products and their reviews.
//!
//! Every mutation and every snapshot runs under one `RwLock`, so a computed
//! dashboard snapshot always reflects a single consistent view.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use shopdash_core::types::{
    DashboardStats, Product, ProductInput, ProductRef, RecentReview, Review, ReviewInput,
    RECENT_REVIEWS_LIMIT, TOP_RATED_LIMIT,
};
use shopdash_core::{DashboardSnapshot, ShopdashError, ShopdashResult, SnapshotSource};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Default)]
struct CatalogState {
    products: BTreeMap<i64, Product>,
    next_product_id: i64,
    next_review_id: i64,
}

impl CatalogState {
    fn allocate_product_id(&mut self) -> i64 {
        self.next_product_id += 1;
        self.next_product_id
    }

    fn build_review(&mut self, product_id: i64, input: &ReviewInput) -> ShopdashResult<Review> {
        validate_review(input)?;
        self.next_review_id += 1;
        Ok(Review {
            id: self.next_review_id,
            product_id,
            rating: input.rating,
            comment: input.comment.clone(),
            date: input.date.unwrap_or_else(Utc::now),
            reviewer_name: input.reviewer_name.clone(),
            reviewer_email: input.reviewer_email.clone(),
        })
    }
}

fn validate_review(input: &ReviewInput) -> ShopdashResult<()> {
    if !(1..=5).contains(&input.rating) {
        return Err(ShopdashError::Validation(
            "review rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

fn validate_product_fields(input: &ProductInput) -> ShopdashResult<()> {
    if let Some(title) = &input.title {
        if title.trim().is_empty() {
            return Err(ShopdashError::Validation("product title must not be empty".to_string()));
        }
    }
    if input.price.is_some_and(|price| !price.is_finite() || price < 0.0) {
        return Err(ShopdashError::Validation("product price must be non-negative".to_string()));
    }
    if input.rating.is_some_and(|rating| !(0.0..=5.0).contains(&rating)) {
        return Err(ShopdashError::Validation(
            "product rating must be between 0 and 5".to_string(),
        ));
    }
    if input.stock.is_some_and(|stock| stock < 0) {
        return Err(ShopdashError::Validation("product stock must be non-negative".to_string()));
    }
    Ok(())
}

fn not_found(id: i64) -> ShopdashError {
    ShopdashError::NotFound(format!("product {id}"))
}

/// Product and review records, the source of truth for the dashboard.
#[derive(Default)]
pub struct CatalogStore {
    state: RwLock<CatalogState>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().products.is_empty()
    }

    pub fn list_products(&self) -> Vec<Product> {
        self.state.read().products.values().cloned().collect()
    }

    pub fn get_product(&self, id: i64) -> ShopdashResult<Product> {
        self.state
            .read()
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    pub fn create_product(&self, input: ProductInput) -> ShopdashResult<Product> {
        validate_product_fields(&input)?;
        for review in &input.reviews {
            validate_review(review)?;
        }
        let title = input
            .title
            .clone()
            .ok_or_else(|| ShopdashError::Validation("product title is required".to_string()))?;
        let price = input
            .price
            .ok_or_else(|| ShopdashError::Validation("product price is required".to_string()))?;

        let mut state = self.state.write();
        let id = state.allocate_product_id();
        let reviews = input
            .reviews
            .iter()
            .map(|review| state.build_review(id, review))
            .collect::<ShopdashResult<Vec<_>>>()?;

        let now = Utc::now();
        let product = Product {
            id,
            title,
            description: input.description,
            category: input.category,
            price,
            discount_percentage: input.discount_percentage,
            rating: input.rating.unwrap_or(0.0),
            stock: input.stock.unwrap_or(0),
            brand: input.brand,
            sku: input.sku,
            thumbnail: input.thumbnail,
            created_at: now,
            updated_at: now,
            reviews,
        };
        state.products.insert(id, product.clone());
        debug!(product_id = id, "Product created");
        Ok(product)
    }

    /// Partial update: absent fields keep their current values,
    /// `reviews_to_add` is appended.
    pub fn update_product(&self, id: i64, input: ProductInput) -> ShopdashResult<Product> {
        validate_product_fields(&input)?;
        for review in &input.reviews_to_add {
            validate_review(review)?;
        }

        let mut state = self.state.write();
        if !state.products.contains_key(&id) {
            return Err(not_found(id));
        }
        let added = input
            .reviews_to_add
            .iter()
            .map(|review| state.build_review(id, review))
            .collect::<ShopdashResult<Vec<_>>>()?;

        let product = state.products.get_mut(&id).ok_or_else(|| not_found(id))?;
        if let Some(title) = input.title {
            product.title = title;
        }
        if let Some(price) = input.price {
            product.price = price;
        }
        if let Some(rating) = input.rating {
            product.rating = rating;
        }
        if let Some(stock) = input.stock {
            product.stock = stock;
        }
        if input.description.is_some() {
            product.description = input.description;
        }
        if input.category.is_some() {
            product.category = input.category;
        }
        if input.discount_percentage.is_some() {
            product.discount_percentage = input.discount_percentage;
        }
        if input.brand.is_some() {
            product.brand = input.brand;
        }
        if input.sku.is_some() {
            product.sku = input.sku;
        }
        if input.thumbnail.is_some() {
            product.thumbnail = input.thumbnail;
        }
        product.reviews.extend(added);
        product.updated_at = Utc::now();

        debug!(product_id = id, "Product updated");
        Ok(product.clone())
    }

    /// Removes the product and its reviews.
    pub fn delete_product(&self, id: i64) -> ShopdashResult<Product> {
        let removed = self.state.write().products.remove(&id).ok_or_else(|| not_found(id))?;
        debug!(product_id = id, reviews = removed.reviews.len(), "Product deleted");
        Ok(removed)
    }

    pub fn add_review(&self, product_id: i64, input: ReviewInput) -> ShopdashResult<Review> {
        let mut state = self.state.write();
        if !state.products.contains_key(&product_id) {
            return Err(not_found(product_id));
        }
        let review = state.build_review(product_id, &input)?;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| not_found(product_id))?;
        product.reviews.push(review.clone());
        Ok(review)
    }

    /// Compute all stats and both ranked lists from one read guard.
    pub fn snapshot(&self) -> DashboardSnapshot {
        let state = self.state.read();
        let products: Vec<&Product> = state.products.values().collect();

        let count = products.len();
        let (avg_price, avg_rating) = if count == 0 {
            (0.0, 0.0)
        } else {
            let n = count as f64;
            (
                products.iter().map(|p| p.price).sum::<f64>() / n,
                products.iter().map(|p| p.rating).sum::<f64>() / n,
            )
        };
        let total_stock = products
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(p.stock.max(0) as u64));

        // Stable sort keeps id order among equal ratings.
        let mut ranked = products.clone();
        ranked.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        let top_rated = ranked
            .into_iter()
            .take(TOP_RATED_LIMIT)
            .cloned()
            .collect();

        let mut recent_reviews: Vec<RecentReview> = products
            .iter()
            .flat_map(|product| {
                let product_ref = ProductRef {
                    id: product.id,
                    title: product.title.clone(),
                    thumbnail: product.thumbnail.clone(),
                };
                product
                    .reviews
                    .iter()
                    .map(move |review| RecentReview::new(review, product_ref.clone()))
            })
            .collect();
        recent_reviews.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        recent_reviews.truncate(RECENT_REVIEWS_LIMIT);

        DashboardSnapshot {
            stats: DashboardStats {
                total_products: count as u64,
                total_stock,
                avg_price,
                avg_rating,
            },
            top_rated,
            recent_reviews,
        }
    }
}

#[async_trait]
impl SnapshotSource for CatalogStore {
    async fn compute_snapshot(&self) -> ShopdashResult<DashboardSnapshot> {
        Ok(self.snapshot())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn product(title: &str, price: f64, rating: f64, stock: i64) -> ProductInput {
        ProductInput {
            title: Some(title.to_string()),
            price: Some(price),
            rating: Some(rating),
            stock: Some(stock),
            ..Default::default()
        }
    }

    fn review(rating: u8, days_ago: i64) -> ReviewInput {
        let base = Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap();
        ReviewInput {
            rating,
            comment: format!("{rating} stars"),
            date: Some(base - Duration::days(days_ago)),
            reviewer_name: "Ada".to_string(),
            reviewer_email: "ada@example.com".to_string(),
        }
    }

    #[test]
    fn test_empty_catalog_snapshot() {
        let snapshot = CatalogStore::new().snapshot();
        assert_eq!(snapshot, DashboardSnapshot::empty());
    }

    #[test]
    fn test_stats_are_computed_from_all_products() {
        let catalog = CatalogStore::new();
        catalog.create_product(product("Lamp", 10.0, 4.0, 5)).unwrap();
        catalog.create_product(product("Desk", 30.0, 3.0, 2)).unwrap();

        let stats = catalog.snapshot().stats;
        assert_eq!(stats.total_products, 2);
        assert_eq!(stats.total_stock, 7);
        assert!((stats.avg_price - 20.0).abs() < f64::EPSILON);
        assert!((stats.avg_rating - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_top_rated_limits_and_breaks_ties_by_id() {
        let catalog = CatalogStore::new();
        let a = catalog.create_product(product("A", 1.0, 4.5, 1)).unwrap();
        let b = catalog.create_product(product("B", 1.0, 4.9, 1)).unwrap();
        let c = catalog.create_product(product("C", 1.0, 4.5, 1)).unwrap();
        catalog.create_product(product("D", 1.0, 1.0, 1)).unwrap();

        let top: Vec<i64> = catalog.snapshot().top_rated.iter().map(|p| p.id).collect();
        assert_eq!(top, vec![b.id, a.id, c.id]);
    }

    #[test]
    fn test_recent_reviews_newest_first_with_product_ref() {
        let catalog = CatalogStore::new();
        let mut input = product("Chair", 50.0, 4.0, 3);
        input.thumbnail = Some("chair.png".to_string());
        input.reviews = (0..8).map(|days| review(5, days)).collect();
        let chair = catalog.create_product(input).unwrap();

        let recent = catalog.snapshot().recent_reviews;
        assert_eq!(recent.len(), RECENT_REVIEWS_LIMIT);
        assert!(recent.windows(2).all(|w| w[0].date >= w[1].date));
        assert_eq!(recent[0].product.id, chair.id);
        assert_eq!(recent[0].product.thumbnail.as_deref(), Some("chair.png"));
    }

    #[test]
    fn test_update_keeps_absent_fields_and_appends_reviews() {
        let catalog = CatalogStore::new();
        let created = catalog.create_product(product("Mug", 8.0, 3.0, 10)).unwrap();

        let updated = catalog
            .update_product(
                created.id,
                ProductInput {
                    stock: Some(4),
                    reviews_to_add: vec![review(4, 0)],
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, "Mug");
        assert_eq!(updated.price, 8.0);
        assert_eq!(updated.stock, 4);
        assert_eq!(updated.reviews.len(), 1);
        assert_eq!(updated.reviews[0].product_id, created.id);
    }

    #[test]
    fn test_delete_cascades_reviews() {
        let catalog = CatalogStore::new();
        let mut input = product("Pen", 2.0, 4.0, 100);
        input.reviews = vec![review(3, 1)];
        let pen = catalog.create_product(input).unwrap();

        catalog.delete_product(pen.id).unwrap();
        let snapshot = catalog.snapshot();
        assert_eq!(snapshot.stats.total_products, 0);
        assert!(snapshot.recent_reviews.is_empty());
        assert!(matches!(
            catalog.delete_product(pen.id),
            Err(ShopdashError::NotFound(_))
        ));
    }

    #[test]
    fn test_missing_product_and_invalid_input() {
        let catalog = CatalogStore::new();
        assert!(matches!(catalog.get_product(9), Err(ShopdashError::NotFound(_))));
        assert!(matches!(
            catalog.update_product(9, ProductInput::default()),
            Err(ShopdashError::NotFound(_))
        ));
        assert!(matches!(
            catalog.add_review(9, review(5, 0)),
            Err(ShopdashError::NotFound(_))
        ));
        assert!(matches!(
            catalog.create_product(ProductInput::default()),
            Err(ShopdashError::Validation(_))
        ));
        assert!(matches!(
            catalog.create_product(product("Bad", -1.0, 3.0, 1)),
            Err(ShopdashError::Validation(_))
        ));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_add_review_rejects_out_of_range_rating() {
        let catalog = CatalogStore::new();
        let p = catalog.create_product(product("Cup", 3.0, 4.0, 1)).unwrap();
        assert!(matches!(
            catalog.add_review(p.id, review(0, 0)),
            Err(ShopdashError::Validation(_))
        ));
        let stored = catalog.add_review(p.id, review(5, 0)).unwrap();
        assert_eq!(catalog.get_product(p.id).unwrap().reviews, vec![stored]);
    }

    #[test]
    fn test_total_stock_saturates_instead_of_overflowing() {
        let catalog = CatalogStore::new();
        for title in ["Crate", "Pallet", "Container"] {
            catalog
                .create_product(product(title, 1.0, 3.0, i64::MAX))
                .unwrap();
        }

        let snapshot = catalog.snapshot();
        assert_eq!(snapshot.stats.total_products, 3);
        assert_eq!(snapshot.stats.total_stock, u64::MAX);
    }

    #[test]
    fn test_rejected_create_does_not_consume_ids() {
        let catalog = CatalogStore::new();
        let mut bad = product("Mug", 8.0, 4.0, 2);
        bad.reviews = vec![review(5, 1), review(9, 0)];
        assert!(matches!(
            catalog.create_product(bad),
            Err(ShopdashError::Validation(_))
        ));
        assert!(catalog.is_empty());

        let mut good = product("Mug", 8.0, 4.0, 2);
        good.reviews = vec![review(5, 1)];
        let created = catalog.create_product(good).unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.reviews[0].id, 1);
    }

    #[tokio::test]
    async fn test_snapshot_source_matches_direct_snapshot() {
        let catalog = CatalogStore::new();
        catalog.create_product(product("Rug", 99.0, 4.2, 1)).unwrap();
        let computed = catalog.compute_snapshot().await.unwrap();
        assert_eq!(computed, catalog.snapshot());
    }
}
