//! The user document and everything embedded in it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::{ProductId, ProductSnapshot};

/// Stable user identifier supplied by the identity service
pub type UserId = Uuid;

/// Maximum number of saved addresses per user
pub const MAX_ADDRESSES: usize = 2;

/// A product frozen into a cart or order at the moment it was added
///
/// The line id is the catalog product id, so adding the same product twice
/// yields two lines sharing one id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub line_id: ProductId,
    pub product_name: String,
    pub price: u64,
    pub rating: u8,
    pub image: String,
}

impl From<ProductSnapshot> for CartLine {
    fn from(product: ProductSnapshot) -> Self {
        Self {
            line_id: product.product_id,
            product_name: product.product_name,
            price: product.price,
            rating: product.rating,
            image: product.image,
        }
    }
}

/// A saved delivery address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub address_id: Uuid,
    #[serde(rename = "house_name")]
    pub house: String,
    #[serde(rename = "street_name")]
    pub street: String,
    #[serde(rename = "city_name")]
    pub city: String,
    #[serde(rename = "pin_code")]
    pub pincode: String,
}

/// Positional address slot exposed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSlot {
    Home,
    Work,
}

impl AddressSlot {
    /// Position of the slot in the address list
    pub fn index(self) -> usize {
        match self {
            AddressSlot::Home => 0,
            AddressSlot::Work => 1,
        }
    }
}

impl std::fmt::Display for AddressSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressSlot::Home => f.write_str("home"),
            AddressSlot::Work => f.write_str("work"),
        }
    }
}

/// How an order is paid for; only cash on delivery is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub cash_on_delivery: bool,
}

impl PaymentMethod {
    pub fn cash_on_delivery() -> Self {
        Self {
            cash_on_delivery: true,
        }
    }
}

/// An immutable order record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub ordered_at: DateTime<Utc>,
    pub total_price: u64,
    pub payment_method: PaymentMethod,
    pub line_items: Vec<CartLine>,
    /// Client-supplied key that created this order, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// What the keyed request asked for; a reuse of the key must match it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_fingerprint: Option<String>,
}

/// One document per user holding the cart, addresses and order history
///
/// `cart_total` is the running sum of `cart[*].price` and is kept in step with
/// the cart by every mutation. `version` is not part of the stored document;
/// repositories fill it from their own bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDocument {
    pub id: UserId,
    #[serde(skip)]
    pub version: i64,
    #[serde(default)]
    pub cart: Vec<CartLine>,
    #[serde(default)]
    pub cart_total: u64,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub orders: Vec<Order>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserDocument {
    /// A freshly provisioned user: empty cart, no addresses, no orders
    pub fn new(id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id,
            version: 0,
            cart: Vec::new(),
            cart_total: 0,
            addresses: Vec::new(),
            orders: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Find the order created with the given idempotency key
    pub fn order_by_idempotency_key(&self, key: &str) -> Option<&Order> {
        self.orders
            .iter()
            .find(|order| order.idempotency_key.as_deref() == Some(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_serialized() {
        let mut doc = UserDocument::new(Uuid::new_v4());
        doc.version = 7;

        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("version").is_none());

        let back: UserDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back.version, 0);
        assert_eq!(back.id, doc.id);
    }

    #[test]
    fn address_uses_legacy_field_names() {
        let address = Address {
            address_id: Uuid::nil(),
            house: "12".to_string(),
            street: "Main".to_string(),
            city: "Douala".to_string(),
            pincode: "654321".to_string(),
        };

        let json = serde_json::to_value(&address).unwrap();
        assert_eq!(json["house_name"], "12");
        assert_eq!(json["street_name"], "Main");
        assert_eq!(json["city_name"], "Douala");
        assert_eq!(json["pin_code"], "654321");
    }

    #[test]
    fn orders_without_key_omit_the_field() {
        let order = Order {
            order_id: Uuid::new_v4(),
            ordered_at: Utc::now(),
            total_price: 0,
            payment_method: PaymentMethod::cash_on_delivery(),
            line_items: vec![],
            idempotency_key: None,
            request_fingerprint: None,
        };

        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("idempotency_key").is_none());
        assert!(json.get("request_fingerprint").is_none());
        assert_eq!(json["payment_method"]["cash_on_delivery"], true);
    }
}
