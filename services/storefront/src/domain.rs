//! Cart, address book and checkout logic over user documents
//!
//! Every mutation follows the same shape: load the user document, apply the
//! change in memory, then write it back with a compare-and-swap on the
//! document version. If another request wrote the document in between, the
//! whole read-modify-write is retried from a fresh read, up to
//! [`StorePolicy::max_write_attempts`] times, after which the caller gets
//! [`StoreError::ConcurrentModification`]. A mutation therefore either
//! applies completely against one consistent snapshot or not at all.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use common::error::DatabaseError;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::models::{AddressSlot, MAX_ADDRESSES, ProductId, UserDocument, UserId};
use crate::repositories::UserDocumentRepository;

pub mod accounts;
pub mod address_book;
pub mod cart;
pub mod checkout;

pub use accounts::Accounts;
pub use address_book::AddressBook;
pub use cart::CartStore;
pub use checkout::CheckoutEngine;

/// The storefront operation a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    RegisterUser,
    AddAddress,
    EditAddress,
    DeleteAddresses,
    AddToCart,
    RemoveFromCart,
    ViewCart,
    Checkout,
    InstantBuy,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::RegisterUser => "register_user",
            Operation::AddAddress => "add_address",
            Operation::EditAddress => "edit_address",
            Operation::DeleteAddresses => "delete_addresses",
            Operation::AddToCart => "add_to_cart",
            Operation::RemoveFromCart => "remove_from_cart",
            Operation::ViewCart => "view_cart",
            Operation::Checkout => "checkout",
            Operation::InstantBuy => "instant_buy",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The step within an operation at which a failure happened
///
/// Plain mutations only ever fail at `LoadUser` or `Commit`; checkout and
/// instant buy walk through the intermediate steps as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    LoadUser,
    LookupProduct,
    Price,
    AppendOrder,
    ClearCart,
    Commit,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::LoadUser => "load_user",
            Step::LookupProduct => "lookup_product",
            Step::Price => "price",
            Step::AppendOrder => "append_order",
            Step::ClearCart => "clear_cart",
            Step::Commit => "commit",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the storefront domain
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed caller input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("a user may hold at most {} addresses", MAX_ADDRESSES)]
    AddressLimitExceeded,

    #[error("no {0} address is saved")]
    SlotNotFound(AddressSlot),

    /// Summing prices did not produce a usable total
    #[error("{operation} failed to aggregate prices at step {step}: {reason}")]
    AggregationFailed {
        operation: Operation,
        step: Step,
        reason: String,
    },

    /// The document kept changing underneath us; retry the whole operation
    #[error("user {user_id} was modified concurrently during {operation}")]
    ConcurrentModification {
        user_id: UserId,
        operation: Operation,
    },

    /// The idempotency key was already spent on a different request
    #[error("idempotency key {key} was already used for a different request")]
    IdempotencyConflict { key: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: Operation,
        after: Duration,
    },

    #[error("{operation} failed at step {step}: {source}")]
    Persistence {
        operation: Operation,
        step: Step,
        #[source]
        source: DatabaseError,
    },
}

impl StoreError {
    pub(crate) fn persistence(operation: Operation, step: Step) -> impl FnOnce(DatabaseError) -> Self {
        move |source| StoreError::Persistence {
            operation,
            step,
            source,
        }
    }
}

/// Retry and timeout budgets for domain operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    /// Attempts at a read-modify-write before giving up with a conflict
    pub max_write_attempts: u32,
    /// Budget for read-only operations
    pub read_timeout: Duration,
    /// Budget for single-document mutations
    pub write_timeout: Duration,
    /// Budget for checkout and instant buy
    pub checkout_timeout: Duration,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            max_write_attempts: 3,
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            checkout_timeout: Duration::from_secs(15),
        }
    }
}

/// Result of applying a mutation to a loaded document
pub(crate) enum Outcome<T> {
    /// Persist the modified document, then return the value
    Write(T),
    /// Nothing changed; return the value without writing
    Unchanged(T),
}

/// Run `operation` under a time budget
pub(crate) async fn with_deadline<T, F>(
    operation: Operation,
    budget: Duration,
    fut: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => {
            error!(%operation, ?budget, "Operation timed out");
            Err(StoreError::Timeout {
                operation,
                after: budget,
            })
        }
    }
}

/// Load a user document, mapping absence to [`StoreError::UserNotFound`]
pub(crate) async fn load_user(
    repo: &dyn UserDocumentRepository,
    user_id: UserId,
    operation: Operation,
) -> Result<UserDocument, StoreError> {
    repo.find_user(user_id)
        .await
        .map_err(|e| {
            error!(%user_id, %operation, step = %Step::LoadUser, "Failed to load user: {}", e);
            StoreError::persistence(operation, Step::LoadUser)(e)
        })?
        .ok_or(StoreError::UserNotFound(user_id))
}

/// Apply `mutation` to the user's document with optimistic concurrency
///
/// The closure runs against a fresh copy of the document on every attempt,
/// so it must derive everything it writes from that copy.
pub(crate) async fn mutate_user<T, F>(
    repo: &dyn UserDocumentRepository,
    policy: &StorePolicy,
    user_id: UserId,
    operation: Operation,
    mut mutation: F,
) -> Result<T, StoreError>
where
    F: FnMut(&mut UserDocument) -> Result<Outcome<T>, StoreError>,
{
    let attempts = policy.max_write_attempts.max(1);

    for attempt in 1..=attempts {
        let mut document = load_user(repo, user_id, operation).await?;
        let expected_version = document.version;

        let value = match mutation(&mut document)? {
            Outcome::Unchanged(value) => return Ok(value),
            Outcome::Write(value) => value,
        };

        document.updated_at = Utc::now();
        let written = repo
            .update_user(&document, expected_version)
            .await
            .map_err(|e| {
                error!(%user_id, %operation, step = %Step::Commit, "Failed to write user: {}", e);
                StoreError::persistence(operation, Step::Commit)(e)
            })?;

        if written {
            debug!(%user_id, %operation, version = expected_version + 1, "User document written");
            return Ok(value);
        }

        warn!(
            %user_id,
            %operation,
            attempt,
            expected_version,
            "User document changed concurrently, retrying"
        );
    }

    Err(StoreError::ConcurrentModification { user_id, operation })
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Repositories and fixtures shared by the domain tests

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use common::error::DatabaseResult;
    use uuid::Uuid;

    use crate::models::{CartLine, ProductSnapshot, UserDocument, UserId};
    use crate::repositories::{InMemoryCatalog, InMemoryUserRepository, UserDocumentRepository};

    pub fn product(name: &str, price: u64) -> ProductSnapshot {
        ProductSnapshot {
            product_id: Uuid::new_v4(),
            product_name: name.to_string(),
            price,
            rating: 4,
            image: format!("/img/{}.jpg", name),
        }
    }

    pub async fn seeded_user(repo: &InMemoryUserRepository) -> UserId {
        let doc = UserDocument::new(Uuid::new_v4());
        repo.insert_user(&doc).await.unwrap();
        doc.id
    }

    pub async fn catalog_with(products: &[ProductSnapshot]) -> Arc<InMemoryCatalog> {
        let catalog = InMemoryCatalog::new();
        for product in products {
            catalog.upsert(product.clone()).await;
        }
        Arc::new(catalog)
    }

    /// Repository that lets another writer slip in before the first
    /// `racing_writes` commits, simulating a concurrent request.
    pub struct RacingRepository {
        pub inner: InMemoryUserRepository,
        pub intruder: CartLine,
        pub racing_writes: usize,
        pub raced: AtomicUsize,
    }

    impl RacingRepository {
        pub fn new(inner: InMemoryUserRepository, intruder: CartLine, racing_writes: usize) -> Self {
            Self {
                inner,
                intruder,
                racing_writes,
                raced: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl UserDocumentRepository for RacingRepository {
        async fn insert_user(&self, document: &UserDocument) -> DatabaseResult<bool> {
            self.inner.insert_user(document).await
        }

        async fn find_user(&self, id: UserId) -> DatabaseResult<Option<UserDocument>> {
            self.inner.find_user(id).await
        }

        async fn update_user(
            &self,
            document: &UserDocument,
            expected_version: i64,
        ) -> DatabaseResult<bool> {
            if self.raced.fetch_add(1, Ordering::SeqCst) < self.racing_writes {
                let mut current = self.inner.find_user(document.id).await?.unwrap();
                let version = current.version;
                current.cart_total += self.intruder.price;
                current.cart.push(self.intruder.clone());
                self.inner.update_user(&current, version).await?;
            }
            self.inner.update_user(document, expected_version).await
        }
    }
}
