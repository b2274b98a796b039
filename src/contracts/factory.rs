// 🏭 StorageFactory - deploys SimpleStorage children and indexes them
//
// Children are append-only: index i is always the i-th deployment.
// Indexed calls outside [0, len) fail and change nothing.

use super::{SimpleStorage, Uint, ValueStore};
use crate::address::Address;
use crate::error::{ContractError, Result};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageFactory {
    /// Factory's own address (deployer of every child)
    pub address: Address,

    /// Deployed children in deployment order (append-only)
    children: Vec<SimpleStorage>,
}

impl StorageFactory {
    pub fn new(address: Address) -> Self {
        StorageFactory {
            address,
            children: Vec::new(),
        }
    }

    /// Rebuild from persisted children (must be in deployment order)
    pub fn restore(address: Address, children: Vec<SimpleStorage>) -> Self {
        StorageFactory { address, children }
    }

    /// Deploy a new SimpleStorage and append it
    ///
    /// Returns the child's address. The factory's nonce is the number of
    /// children already deployed.
    pub fn deploy_instance(&mut self) -> Address {
        let nonce = self.children.len() as u64;
        let child = Address::derive(&self.address, nonce);
        self.children.push(SimpleStorage::new(child));

        info!(factory = %self.address, %child, index = nonce, "instance deployed");
        child
    }

    /// Call `set` on the child at `index`
    pub fn set_at(&mut self, index: usize, value: Uint) -> Result<()> {
        let len = self.children.len();
        let child = self.children.get_mut(index).ok_or_else(|| {
            warn!(factory = %self.address, index, len, "set_at rejected");
            ContractError::IndexOutOfBounds { index, len }
        })?;
        child.set(value);
        Ok(())
    }

    /// Call `get` on the child at `index`
    pub fn get_at(&self, index: usize) -> Result<Uint> {
        let child = self.instance(index)?;
        debug!(factory = %self.address, index, "get_at");
        Ok(child.get())
    }

    pub fn instance(&self, index: usize) -> Result<&SimpleStorage> {
        self.children.get(index).ok_or_else(|| {
            warn!(factory = %self.address, index, len = self.children.len(), "index rejected");
            ContractError::IndexOutOfBounds {
                index,
                len: self.children.len(),
            }
        })
    }

    pub fn instances(&self) -> &[SimpleStorage] {
        &self.children
    }

    /// Child addresses in deployment order
    pub fn addresses(&self) -> Vec<Address> {
        self.children.iter().map(|c| c.address).collect()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}
