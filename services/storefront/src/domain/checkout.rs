//! Turning a cart (or a single product) into an order
//!
//! A checkout prices the cart, builds the order with its line items already
//! attached, appends it to the order history and empties the cart. All of
//! that happens on one loaded snapshot of the user document and reaches the
//! store as a single versioned write, so a concurrent cart change either
//! lands before the snapshot (and is part of the order) or after the commit
//! (and stays in the cart). Only the new order is ever written; earlier
//! orders are carried over untouched.
//!
//! An idempotency key is bound to the request that first used it: the
//! operation and, for an instant buy, the product. Reusing a key for a
//! different request is a conflict rather than a replay.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cart::lookup_product;
use super::{
    Operation, Outcome, Step, StoreError, StorePolicy, load_user, mutate_user, with_deadline,
};
use crate::models::{
    CartLine, CheckoutReceipt, Order, PaymentMethod, ProductId, UserDocument, UserId,
};
use crate::repositories::{CatalogReader, UserDocumentRepository};
use crate::validation::validate_idempotency_key;

/// Client-supplied key making a checkout safe to resend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        validate_idempotency_key(raw).map_err(StoreError::InvalidInput)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Checkout engine
#[derive(Clone)]
pub struct CheckoutEngine {
    users: Arc<dyn UserDocumentRepository>,
    catalog: Arc<dyn CatalogReader>,
    policy: StorePolicy,
}

impl CheckoutEngine {
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

    /// Convert the user's cart into an order and empty the cart
    pub async fn checkout(
        &self,
        user_id: UserId,
        key: Option<&IdempotencyKey>,
    ) -> Result<CheckoutReceipt, StoreError> {
        let fingerprint = fingerprint(Operation::Checkout, None);
        let receipt = with_deadline(Operation::Checkout, self.policy.checkout_timeout, async {
            mutate_user(
                self.users.as_ref(),
                &self.policy,
                user_id,
                Operation::Checkout,
                |doc| checkout_cart(doc, key, &fingerprint),
            )
            .await
        })
        .await?;

        log_receipt(user_id, Operation::Checkout, &receipt);
        Ok(receipt)
    }

    /// Order a single product straight from the catalog, leaving the cart alone
    ///
    /// A keyed retry is answered from the order history before the catalog is
    /// consulted, so it still replays after the product has been delisted.
    pub async fn instant_buy(
        &self,
        user_id: UserId,
        product_id: ProductId,
        key: Option<&IdempotencyKey>,
    ) -> Result<CheckoutReceipt, StoreError> {
        let fingerprint = fingerprint(Operation::InstantBuy, Some(product_id));
        let receipt = with_deadline(Operation::InstantBuy, self.policy.checkout_timeout, async {
            if key.is_some() {
                let doc = load_user(self.users.as_ref(), user_id, Operation::InstantBuy).await?;
                if let Some(receipt) = replay(&doc, key, &fingerprint)? {
                    return Ok(receipt);
                }
            }

            let product =
                lookup_product(self.catalog.as_ref(), product_id, Operation::InstantBuy).await?;
            let line = CartLine::from(product);

            mutate_user(
                self.users.as_ref(),
                &self.policy,
                user_id,
                Operation::InstantBuy,
                |doc| buy_line(doc, line.clone(), key, &fingerprint),
            )
            .await
        })
        .await?;

        log_receipt(user_id, Operation::InstantBuy, &receipt);
        Ok(receipt)
    }
}

fn log_receipt(user_id: UserId, operation: Operation, receipt: &CheckoutReceipt) {
    if receipt.replayed {
        info!(
            %user_id,
            %operation,
            order_id = %receipt.order.order_id,
            "Returned existing order for idempotency key"
        );
    } else {
        info!(
            %user_id,
            %operation,
            order_id = %receipt.order.order_id,
            total_price = receipt.order.total_price,
            lines = receipt.order.line_items.len(),
            "Order placed"
        );
    }
}

/// Identifies what a keyed request asked for
fn fingerprint(operation: Operation, product_id: Option<ProductId>) -> String {
    match product_id {
        Some(id) => format!("{}:{}", operation, id),
        None => operation.to_string(),
    }
}

/// The order an earlier request with the same key created, if any
///
/// Orders stored without a fingerprint match any request using their key.
fn replay(
    doc: &UserDocument,
    key: Option<&IdempotencyKey>,
    fingerprint: &str,
) -> Result<Option<CheckoutReceipt>, StoreError> {
    let Some(key) = key else {
        return Ok(None);
    };
    let Some(order) = doc.order_by_idempotency_key(key.as_str()) else {
        return Ok(None);
    };

    if let Some(stored) = order.request_fingerprint.as_deref() {
        if stored != fingerprint {
            warn!(
                user_id = %doc.id,
                key = key.as_str(),
                stored,
                requested = fingerprint,
                "Idempotency key reused for a different request"
            );
            return Err(StoreError::IdempotencyConflict {
                key: key.as_str().to_string(),
            });
        }
    }

    Ok(Some(CheckoutReceipt {
        order: order.clone(),
        replayed: true,
    }))
}

/// Sum line prices; an empty list totals 0
fn price(lines: &[CartLine], operation: Operation) -> Result<u64, StoreError> {
    lines
        .iter()
        .try_fold(0u64, |total, line| total.checked_add(line.price))
        .ok_or_else(|| StoreError::AggregationFailed {
            operation,
            step: Step::Price,
            reason: format!("sum of {} line prices overflows", lines.len()),
        })
}

fn new_order(
    total_price: u64,
    line_items: Vec<CartLine>,
    key: Option<&IdempotencyKey>,
    fingerprint: &str,
) -> Order {
    Order {
        order_id: Uuid::new_v4(),
        ordered_at: Utc::now(),
        total_price,
        payment_method: PaymentMethod::cash_on_delivery(),
        line_items,
        idempotency_key: key.map(|k| k.as_str().to_string()),
        request_fingerprint: key.map(|_| fingerprint.to_string()),
    }
}

fn checkout_cart(
    doc: &mut UserDocument,
    key: Option<&IdempotencyKey>,
    fingerprint: &str,
) -> Result<Outcome<CheckoutReceipt>, StoreError> {
    if let Some(receipt) = replay(doc, key, fingerprint)? {
        return Ok(Outcome::Unchanged(receipt));
    }
    let user_id = doc.id;

    let total = price(&doc.cart, Operation::Checkout)?;
    if total != doc.cart_total {
        warn!(
            %user_id,
            running_total = doc.cart_total,
            line_sum = total,
            "Running cart total disagrees with its lines, pricing from the lines"
        );
    }
    debug!(%user_id, step = %Step::Price, total, "Cart priced");

    let order = new_order(total, doc.cart.clone(), key, fingerprint);
    doc.orders.push(order.clone());
    debug!(%user_id, step = %Step::AppendOrder, order_id = %order.order_id, "Order appended");

    doc.cart.clear();
    doc.cart_total = 0;
    debug!(%user_id, step = %Step::ClearCart, "Cart cleared");

    Ok(Outcome::Write(CheckoutReceipt {
        order,
        replayed: false,
    }))
}

fn buy_line(
    doc: &mut UserDocument,
    line: CartLine,
    key: Option<&IdempotencyKey>,
    fingerprint: &str,
) -> Result<Outcome<CheckoutReceipt>, StoreError> {
    if let Some(receipt) = replay(doc, key, fingerprint)? {
        return Ok(Outcome::Unchanged(receipt));
    }

    let order = new_order(line.price, vec![line], key, fingerprint);
    doc.orders.push(order.clone());
    debug!(user_id = %doc.id, step = %Step::AppendOrder, order_id = %order.order_id, "Order appended");

    Ok(Outcome::Write(CheckoutReceipt {
        order,
        replayed: false,
    }))
}
