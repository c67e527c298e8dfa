//! The cart embedded in each user document
//!
//! A cart is a flat list of frozen product snapshots: adding a product twice
//! gives two lines. `cart_total` on the document is kept equal to the sum of
//! line prices by every function here.

use std::sync::Arc;

use tracing::{error, info};

use super::{
    Operation, Outcome, Step, StoreError, StorePolicy, load_user, mutate_user, with_deadline,
};
use crate::models::{CartLine, CartView, ProductId, ProductSnapshot, UserDocument, UserId};
use crate::repositories::{CatalogReader, UserDocumentRepository};

/// Cart store
#[derive(Clone)]
pub struct CartStore {
    users: Arc<dyn UserDocumentRepository>,
    catalog: Arc<dyn CatalogReader>,
    policy: StorePolicy,
}

impl CartStore {
    pub fn new(
        users: Arc<dyn UserDocumentRepository>,
        catalog: Arc<dyn CatalogReader>,
        policy: StorePolicy,
    ) -> Self {
        Self {
            users,
            catalog,
            policy,
        }
    }

    /// Freeze the product's current catalog data into a new cart line
    pub async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<CartLine, StoreError> {
        let line = with_deadline(Operation::AddToCart, self.policy.write_timeout, async {
            let product =
                lookup_product(self.catalog.as_ref(), product_id, Operation::AddToCart).await?;
            let line = CartLine::from(product);

            mutate_user(
                self.users.as_ref(),
                &self.policy,
                user_id,
                Operation::AddToCart,
                |doc| {
                    append_line(doc, line.clone(), Operation::AddToCart)?;
                    Ok(Outcome::Write(line.clone()))
                },
            )
            .await
        })
        .await?;

        info!(%user_id, %product_id, price = line.price, "Added product to cart");
        Ok(line)
    }

    /// Remove every cart line carrying `line_id`. Returns how many went.
    ///
    /// Removing an id that is not in the cart is a successful no-op.
    pub async fn remove_from_cart(
        &self,
        user_id: UserId,
        line_id: ProductId,
    ) -> Result<usize, StoreError> {
        let removed = with_deadline(Operation::RemoveFromCart, self.policy.write_timeout, async {
            mutate_user(
                self.users.as_ref(),
                &self.policy,
                user_id,
                Operation::RemoveFromCart,
                |doc| {
                    let removed = remove_lines(doc, line_id);
                    if removed == 0 {
                        Ok(Outcome::Unchanged(0))
                    } else {
                        Ok(Outcome::Write(removed))
                    }
                },
            )
            .await
        })
        .await?;

        info!(%user_id, %line_id, removed, "Removed lines from cart");
        Ok(removed)
    }

    /// Current cart lines and their total; an empty cart totals 0
    pub async fn get_cart(&self, user_id: UserId) -> Result<CartView, StoreError> {
        with_deadline(Operation::ViewCart, self.policy.read_timeout, async {
            let doc = load_user(self.users.as_ref(), user_id, Operation::ViewCart).await?;
            Ok(CartView {
                total: doc.cart_total,
                lines: doc.cart,
            })
        })
        .await
    }
}

/// Fetch a product snapshot, mapping absence to [`StoreError::ProductNotFound`]
pub(crate) async fn lookup_product(
    catalog: &dyn CatalogReader,
    product_id: ProductId,
    operation: Operation,
) -> Result<ProductSnapshot, StoreError> {
    catalog
        .get_product(product_id)
        .await
        .map_err(|e| {
            error!(%product_id, %operation, step = %Step::LookupProduct, "Catalog lookup failed: {}", e);
            StoreError::persistence(operation, Step::LookupProduct)(e)
        })?
        .ok_or(StoreError::ProductNotFound(product_id))
}

/// Append a line and grow the running total
fn append_line(doc: &mut UserDocument, line: CartLine, operation: Operation) -> Result<(), StoreError> {
    doc.cart_total = doc
        .cart_total
        .checked_add(line.price)
        .ok_or_else(|| StoreError::AggregationFailed {
            operation,
            step: Step::Price,
            reason: format!("cart total overflows adding {}", line.price),
        })?;
    doc.cart.push(line);
    Ok(())
}

/// Drop every line with `line_id` and shrink the running total
fn remove_lines(doc: &mut UserDocument, line_id: ProductId) -> usize {
    let before = doc.cart.len();
    let mut removed_total: u64 = 0;
    doc.cart.retain(|line| {
        if line.line_id == line_id {
            removed_total = removed_total.saturating_add(line.price);
            false
        } else {
            true
        }
    });
    doc.cart_total = doc.cart_total.saturating_sub(removed_total);
    before - doc.cart.len()
}
