//! Small demo catalog for local runs.

use crate::store::CatalogStore;
use shopdash_core::types::{ProductInput, ReviewInput};
use shopdash_core::ShopdashResult;
use tracing::info;

fn review(rating: u8, comment: &str, name: &str) -> ReviewInput {
    ReviewInput {
        rating,
        comment: comment.to_string(),
        date: None,
        reviewer_name: name.to_string(),
        reviewer_email: format!("{}@example.com", name.to_lowercase()),
    }
}

fn demo_products() -> Vec<ProductInput> {
    vec![
        ProductInput {
            title: Some("Essence Mascara Lash Princess".to_string()),
            category: Some("beauty".to_string()),
            price: Some(9.99),
            rating: Some(4.94),
            stock: Some(5),
            brand: Some("Essence".to_string()),
            thumbnail: Some("https://cdn.example.com/mascara.png".to_string()),
            reviews: vec![
                review(5, "Very satisfied!", "Eleanor"),
                review(4, "Would buy again", "Lucas"),
            ],
            ..Default::default()
        },
        ProductInput {
            title: Some("Eyeshadow Palette with Mirror".to_string()),
            category: Some("beauty".to_string()),
            price: Some(19.99),
            rating: Some(3.28),
            stock: Some(44),
            brand: Some("Glamour Beauty".to_string()),
            thumbnail: Some("https://cdn.example.com/palette.png".to_string()),
            reviews: vec![review(3, "Average quality", "Savannah")],
            ..Default::default()
        },
        ProductInput {
            title: Some("Annibale Colombo Bed".to_string()),
            category: Some("furniture".to_string()),
            price: Some(1899.99),
            rating: Some(4.14),
            stock: Some(47),
            brand: Some("Annibale Colombo".to_string()),
            thumbnail: Some("https://cdn.example.com/bed.png".to_string()),
            reviews: vec![review(5, "Excellent quality!", "Aria")],
            ..Default::default()
        },
        ProductInput {
            title: Some("Apple".to_string()),
            category: Some("groceries".to_string()),
            price: Some(1.99),
            rating: Some(4.19),
            stock: Some(9),
            thumbnail: Some("https://cdn.example.com/apple.png".to_string()),
            ..Default::default()
        },
    ]
}

/// Load the demo products. Returns how many were inserted.
pub fn seed_demo(catalog: &CatalogStore) -> ShopdashResult<usize> {
    let products = demo_products();
    let count = products.len();
    for input in products {
        catalog.create_product(input)?;
    }
    info!(products = count, "Seeded demo catalog");
    Ok(count)
}
