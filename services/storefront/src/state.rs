//! Application state shared across handlers

use std::sync::Arc;

use crate::domain::{Accounts, AddressBook, CartStore, CheckoutEngine, StorePolicy};
use crate::identity::Authenticator;
use crate::repositories::{CatalogReader, UserDocumentRepository};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<dyn Authenticator>,
    pub catalog: Arc<dyn CatalogReader>,
    pub accounts: Accounts,
    pub address_book: AddressBook,
    pub cart: CartStore,
    pub checkout: CheckoutEngine,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserDocumentRepository>,
        catalog: Arc<dyn CatalogReader>,
        authenticator: Arc<dyn Authenticator>,
        policy: StorePolicy,
    ) -> Self {
        Self {
            authenticator,
            accounts: Accounts::new(users.clone(), policy),
            address_book: AddressBook::new(users.clone(), policy),
            cart: CartStore::new(users.clone(), catalog.clone(), policy),
            checkout: CheckoutEngine::new(users, catalog.clone(), policy),
            catalog,
        }
    }
}
