// 📦 SimpleStorage - one integer, last write wins

use super::{Uint, ValueStore};
use crate::address::Address;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleStorage {
    /// Where this instance is deployed (never changes)
    pub address: Address,

    #[serde(with = "uint_string")]
    value: Uint,
}

impl SimpleStorage {
    /// Fresh instance holding zero
    pub fn new(address: Address) -> Self {
        SimpleStorage { address, value: 0 }
    }

    /// Rebuild an instance from persisted state
    pub fn restore(address: Address, value: Uint) -> Self {
        SimpleStorage { address, value }
    }
}

impl ValueStore for SimpleStorage {
    fn set(&mut self, value: Uint) {
        debug!(contract = %self.address, old = %self.value, new = %value, "store value");
        self.value = value;
    }

    fn get(&self) -> Uint {
        self.value
    }
}

/// Serialize u128 as a decimal string (JSON numbers lose precision past 2^53)
pub(crate) mod uint_string {
    use super::Uint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Uint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Uint, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
