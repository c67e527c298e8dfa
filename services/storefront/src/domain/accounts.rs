//! Provisioning of user documents for authenticated callers

use std::sync::Arc;

use tracing::{error, info};

use super::{Operation, Step, StoreError, StorePolicy, with_deadline};
use crate::models::{UserDocument, UserId};
use crate::repositories::UserDocumentRepository;

/// Creates the storefront document for users issued by the identity service
#[derive(Clone)]
pub struct Accounts {
    users: Arc<dyn UserDocumentRepository>,
    policy: StorePolicy,
}

impl Accounts {
    pub fn new(users: Arc<dyn UserDocumentRepository>, policy: StorePolicy) -> Self {
        Self { users, policy }
    }

    /// Ensure a document exists for `user_id`. Returns true if it was created.
    pub async fn register(&self, user_id: UserId) -> Result<bool, StoreError> {
        with_deadline(Operation::RegisterUser, self.policy.write_timeout, async {
            let created = self
                .users
                .insert_user(&UserDocument::new(user_id))
                .await
                .map_err(|e| {
                    error!(%user_id, "Failed to provision user: {}", e);
                    StoreError::persistence(Operation::RegisterUser, Step::Commit)(e)
                })?;

            if created {
                info!(%user_id, "Provisioned user document");
            }
            Ok(created)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryUserRepository;
    use uuid::Uuid;

    #[tokio::test]
    async fn registration_is_idempotent() {
        let repo = InMemoryUserRepository::new();
        let accounts = Accounts::new(Arc::new(repo.clone()), StorePolicy::default());
        let user_id = Uuid::new_v4();

        assert!(accounts.register(user_id).await.unwrap());
        assert!(!accounts.register(user_id).await.unwrap());

        let doc = repo.find_user(user_id).await.unwrap().unwrap();
        assert!(doc.cart.is_empty());
        assert!(doc.addresses.is_empty());
        assert!(doc.orders.is_empty());
        assert_eq!(doc.cart_total, 0);
    }
}
