//! Catalog reader for product lookups
//!
//! The storefront only ever reads the catalog. Snapshots returned here are
//! copied into carts and orders, so later price changes never reach them.

use std::sync::Arc;

use async_trait::async_trait;
use common::{
    cache::RedisPool,
    error::{DatabaseError, DatabaseResult},
};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{debug, warn};

use crate::models::{ProductId, ProductSnapshot};

/// Read-only access to catalog products
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Fetch one product by id.
    async fn get_product(&self, id: ProductId) -> DatabaseResult<Option<ProductSnapshot>>;

    /// Case-insensitive substring search on product names. An empty query
    /// lists the whole catalog.
    async fn find_products(&self, query: &str) -> DatabaseResult<Vec<ProductSnapshot>>;
}

/// Catalog backed by the PostgreSQL `products` table
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Create a new catalog reader
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn snapshot_from_row(row: &PgRow) -> DatabaseResult<ProductSnapshot> {
        let product_id: ProductId = row.try_get("id").map_err(DatabaseError::from_sqlx)?;
        let price: i64 = row.try_get("price").map_err(DatabaseError::from_sqlx)?;
        let rating: i16 = row.try_get("rating").map_err(DatabaseError::from_sqlx)?;

        let price = u64::try_from(price).map_err(|_| {
            DatabaseError::Decode(format!("product {} has negative price {}", product_id, price))
        })?;
        let rating = u8::try_from(rating).map_err(|_| {
            DatabaseError::Decode(format!(
                "product {} has out-of-range rating {}",
                product_id, rating
            ))
        })?;

        Ok(ProductSnapshot {
            product_id,
            product_name: row.try_get("name").map_err(DatabaseError::from_sqlx)?,
            price,
            rating,
            image: row.try_get("image").map_err(DatabaseError::from_sqlx)?,
        })
    }
}

#[async_trait]
impl CatalogReader for PgCatalog {
    async fn get_product(&self, id: ProductId) -> DatabaseResult<Option<ProductSnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, price, rating, image
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.as_ref().map(Self::snapshot_from_row).transpose()
    }

    async fn find_products(&self, query: &str) -> DatabaseResult<Vec<ProductSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, price, rating, image
            FROM products
            WHERE name ILIKE '%' || $1 || '%'
            ORDER BY name
            "#,
        )
        .bind(escape_like(query))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        rows.iter().map(Self::snapshot_from_row).collect()
    }
}

/// Escape LIKE wildcards so user input only ever matches literally
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Read-through Redis cache in front of another catalog
///
/// Cache failures are logged and the inner catalog answers instead.
#[derive(Clone)]
pub struct CachedCatalog {
    inner: Arc<dyn CatalogReader>,
    redis: RedisPool,
    ttl_seconds: u64,
}

impl CachedCatalog {
    /// Wrap `inner` with a cache whose entries live for `ttl_seconds`
    pub fn new(inner: Arc<dyn CatalogReader>, redis: RedisPool, ttl_seconds: u64) -> Self {
        Self {
            inner,
            redis,
            ttl_seconds,
        }
    }

    fn cache_key(id: ProductId) -> String {
        format!("catalog:product:{}", id)
    }

    async fn cached(&self, id: ProductId) -> Option<ProductSnapshot> {
        match self.redis.get_json(&Self::cache_key(id)).await {
            Ok(product) => product,
            Err(e) => {
                warn!(%id, "Catalog cache read failed: {}", e);
                None
            }
        }
    }

    async fn remember(&self, product: &ProductSnapshot) {
        let key = Self::cache_key(product.product_id);
        if let Err(e) = self.redis.set_json(&key, product, self.ttl_seconds).await {
            warn!(id = %product.product_id, "Catalog cache write failed: {}", e);
        }
    }
}

#[async_trait]
impl CatalogReader for CachedCatalog {
    async fn get_product(&self, id: ProductId) -> DatabaseResult<Option<ProductSnapshot>> {
        if let Some(product) = self.cached(id).await {
            debug!(%id, "Catalog cache hit");
            return Ok(Some(product));
        }

        let product = self.inner.get_product(id).await?;
        if let Some(product) = &product {
            self.remember(product).await;
        }
        Ok(product)
    }

    async fn find_products(&self, query: &str) -> DatabaseResult<Vec<ProductSnapshot>> {
        self.inner.find_products(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50% off_now"), "50\\% off\\_now");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("laptop"), "laptop");
    }

    #[test]
    fn cache_keys_are_namespaced() {
        let id = uuid::Uuid::nil();
        assert_eq!(
            CachedCatalog::cache_key(id),
            "catalog:product:00000000-0000-0000-0000-000000000000"
        );
    }
}
