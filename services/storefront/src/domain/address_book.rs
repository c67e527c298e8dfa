//! Saved addresses, at most two per user
//!
//! The wire contract edits addresses by position (home = 0, work = 1). Each
//! stored address carries its own id, and edits resolve the slot to that id
//! before touching anything.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::{Operation, Outcome, StoreError, StorePolicy, mutate_user, with_deadline};
use crate::models::{Address, AddressRequest, AddressSlot, MAX_ADDRESSES, UserDocument, UserId};
use crate::repositories::UserDocumentRepository;
use crate::validation::validate_address;

/// Address book manager
#[derive(Clone)]
pub struct AddressBook {
    users: Arc<dyn UserDocumentRepository>,
    policy: StorePolicy,
}

impl AddressBook {
    pub fn new(users: Arc<dyn UserDocumentRepository>, policy: StorePolicy) -> Self {
        Self { users, policy }
    }

    /// Append a new address, refusing a third one
    pub async fn add_address(
        &self,
        user_id: UserId,
        request: &AddressRequest,
    ) -> Result<Address, StoreError> {
        validate_address(request).map_err(StoreError::InvalidInput)?;

        let address = with_deadline(Operation::AddAddress, self.policy.write_timeout, async {
            mutate_user(
                self.users.as_ref(),
                &self.policy,
                user_id,
                Operation::AddAddress,
                |doc| {
                    if doc.addresses.len() >= MAX_ADDRESSES {
                        return Err(StoreError::AddressLimitExceeded);
                    }
                    let address = Address {
                        address_id: Uuid::new_v4(),
                        house: request.house.trim().to_string(),
                        street: request.street.trim().to_string(),
                        city: request.city.trim().to_string(),
                        pincode: request.pincode.trim().to_string(),
                    };
                    doc.addresses.push(address.clone());
                    Ok(Outcome::Write(address))
                },
            )
            .await
        })
        .await?;

        info!(%user_id, address_id = %address.address_id, "Address added");
        Ok(address)
    }

    /// Overwrite every field of the address in `slot`
    pub async fn edit_address(
        &self,
        user_id: UserId,
        slot: AddressSlot,
        request: &AddressRequest,
    ) -> Result<Address, StoreError> {
        validate_address(request).map_err(StoreError::InvalidInput)?;

        let address = with_deadline(Operation::EditAddress, self.policy.write_timeout, async {
            mutate_user(
                self.users.as_ref(),
                &self.policy,
                user_id,
                Operation::EditAddress,
                |doc| {
                    let address_id = address_in_slot(doc, slot)?;
                    let address = doc
                        .addresses
                        .iter_mut()
                        .find(|a| a.address_id == address_id)
                        .ok_or(StoreError::SlotNotFound(slot))?;

                    address.house = request.house.trim().to_string();
                    address.street = request.street.trim().to_string();
                    address.city = request.city.trim().to_string();
                    address.pincode = request.pincode.trim().to_string();
                    Ok(Outcome::Write(address.clone()))
                },
            )
            .await
        })
        .await?;

        info!(%user_id, %slot, address_id = %address.address_id, "Address edited");
        Ok(address)
    }

    /// Remove every saved address
    pub async fn delete_all_addresses(&self, user_id: UserId) -> Result<(), StoreError> {
        with_deadline(Operation::DeleteAddresses, self.policy.write_timeout, async {
            mutate_user(
                self.users.as_ref(),
                &self.policy,
                user_id,
                Operation::DeleteAddresses,
                |doc| {
                    if doc.addresses.is_empty() {
                        return Ok(Outcome::Unchanged(()));
                    }
                    doc.addresses.clear();
                    Ok(Outcome::Write(()))
                },
            )
            .await
        })
        .await?;

        info!(%user_id, "Addresses deleted");
        Ok(())
    }
}

/// Id of the address currently occupying `slot`
fn address_in_slot(doc: &UserDocument, slot: AddressSlot) -> Result<Uuid, StoreError> {
    doc.addresses
        .get(slot.index())
        .map(|a| a.address_id)
        .ok_or(StoreError::SlotNotFound(slot))
}
