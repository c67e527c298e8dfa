//! Repositories for database operations
//!
//! Every user is one JSON document in the `users` table. Writes are
//! compare-and-swap on the `version` column: an update only lands when the
//! caller saw the latest version, and each successful write bumps it by one.

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, types::Json};

use crate::models::{UserDocument, UserId};

pub mod catalog;
pub mod memory;

pub use catalog::{CachedCatalog, CatalogReader, PgCatalog};
pub use memory::{InMemoryCatalog, InMemoryUserRepository};

/// Persistence boundary for user documents
#[async_trait]
pub trait UserDocumentRepository: Send + Sync {
    /// Store a new document. Returns false if the id is already taken.
    async fn insert_user(&self, document: &UserDocument) -> DatabaseResult<bool>;

    /// Load a document together with its current version.
    async fn find_user(&self, id: UserId) -> DatabaseResult<Option<UserDocument>>;

    /// Replace the stored document if its version still equals
    /// `expected_version`. Returns false when another write got there first.
    async fn update_user(
        &self,
        document: &UserDocument,
        expected_version: i64,
    ) -> DatabaseResult<bool>;
}

/// User document repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDocumentRepository for PgUserRepository {
    async fn insert_user(&self, document: &UserDocument) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, version, document, created_at, updated_at)
            VALUES ($1, 0, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(document.id)
        .bind(Json(document))
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_user(&self, id: UserId) -> DatabaseResult<Option<UserDocument>> {
        let row = sqlx::query(
            r#"
            SELECT version, document
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some(row) => {
                let version: i64 = row.try_get("version").map_err(DatabaseError::from_sqlx)?;
                let Json(mut document): Json<UserDocument> =
                    row.try_get("document").map_err(DatabaseError::from_sqlx)?;
                if document.id != id {
                    return Err(DatabaseError::Decode(format!(
                        "document stored under {} claims id {}",
                        id, document.id
                    )));
                }
                document.version = version;
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    async fn update_user(
        &self,
        document: &UserDocument,
        expected_version: i64,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET document = $3, version = version + 1, updated_at = $4
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(document.id)
        .bind(expected_version)
        .bind(Json(document))
        .bind(document.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}
