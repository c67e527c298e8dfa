//! API models for request and response payloads

use serde::{Deserialize, Serialize};

pub mod product;
pub mod user;

pub use product::{ProductId, ProductSearchQuery, ProductSnapshot};
pub use user::{
    Address, AddressSlot, CartLine, MAX_ADDRESSES, Order, PaymentMethod, UserDocument, UserId,
};

/// Query string carrying only a user id (`?id=`)
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub id: Option<String>,
}

/// Query string carrying a product id and the acting user (`?id=&userID=`)
#[derive(Debug, Deserialize)]
pub struct ProductActionQuery {
    pub id: Option<String>,
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
}

/// Query string for cart checkout (`?userID=`)
#[derive(Debug, Deserialize)]
pub struct CheckoutQuery {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
}

/// Address fields as sent by clients
///
/// Both the historical `*_name` keys and the short keys are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddressRequest {
    #[serde(alias = "house_name")]
    pub house: String,
    #[serde(alias = "street_name")]
    pub street: String,
    #[serde(alias = "city_name")]
    pub city: String,
    #[serde(alias = "pin_code")]
    pub pincode: String,
}

/// Current cart contents and their running total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    pub total: u64,
    pub lines: Vec<CartLine>,
}

/// Result of a checkout or instant buy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub order: Order,
    /// True when an earlier order with the same idempotency key was returned
    pub replayed: bool,
}

/// Response for checkout and instant buy
#[derive(Serialize)]
pub struct OrderResponse {
    pub message: String,
    pub order: Order,
    pub replayed: bool,
}

/// Response for user provisioning
#[derive(Serialize)]
pub struct RegistrationResponse {
    pub user_id: UserId,
    pub created: bool,
}
