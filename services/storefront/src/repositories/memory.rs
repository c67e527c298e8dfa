//! In-memory repositories
//!
//! Same compare-and-swap contract as the PostgreSQL repositories, kept in
//! process. Used by the test suites and for running without a database.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::error::DatabaseResult;
use tokio::sync::RwLock;

use super::{UserDocumentRepository, catalog::CatalogReader};
use crate::models::{ProductId, ProductSnapshot, UserDocument, UserId};

/// User documents held in a shared map
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserRepository {
    documents: Arc<RwLock<HashMap<UserId, UserDocument>>>,
}

impl InMemoryUserRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDocumentRepository for InMemoryUserRepository {
    async fn insert_user(&self, document: &UserDocument) -> DatabaseResult<bool> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(&document.id) {
            return Ok(false);
        }

        let mut stored = document.clone();
        stored.version = 0;
        documents.insert(stored.id, stored);
        Ok(true)
    }

    async fn find_user(&self, id: UserId) -> DatabaseResult<Option<UserDocument>> {
        let documents = self.documents.read().await;
        Ok(documents.get(&id).cloned())
    }

    async fn update_user(
        &self,
        document: &UserDocument,
        expected_version: i64,
    ) -> DatabaseResult<bool> {
        let mut documents = self.documents.write().await;
        match documents.get_mut(&document.id) {
            Some(stored) if stored.version == expected_version => {
                let mut next = document.clone();
                next.version = expected_version + 1;
                *stored = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Catalog products held in a shared map
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<ProductId, ProductSnapshot>>>,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a product
    pub async fn upsert(&self, product: ProductSnapshot) {
        self.products
            .write()
            .await
            .insert(product.product_id, product);
    }
}

#[async_trait]
impl CatalogReader for InMemoryCatalog {
    async fn get_product(&self, id: ProductId) -> DatabaseResult<Option<ProductSnapshot>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn find_products(&self, query: &str) -> DatabaseResult<Vec<ProductSnapshot>> {
        let needle = query.to_lowercase();
        let mut matches: Vec<ProductSnapshot> = self
            .products
            .read()
            .await
            .values()
            .filter(|product| product.product_name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.product_name.cmp(&b.product_name));
        Ok(matches)
    }
}
