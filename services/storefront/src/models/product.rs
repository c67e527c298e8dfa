//! Catalog product models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog product identifier
pub type ProductId = Uuid;

/// A product as the catalog currently describes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub product_name: String,
    pub price: u64,
    pub rating: u8,
    pub image: String,
}

/// Query parameters for product search
#[derive(Debug, Clone, Deserialize)]
pub struct ProductSearchQuery {
    pub name: Option<String>,
}
