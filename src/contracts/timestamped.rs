// ⏳ TimestampedStorage - SimpleStorage whose `set` also records when
//
// Override by composition: the inner SimpleStorage does the write, this type
// adds the timestamp. The recorded time never moves backwards, even if the
// clock does.

use super::{SimpleStorage, Uint, ValueStore};
use crate::address::Address;
use crate::clock::Clock;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct TimestampedStorage {
    inner: SimpleStorage,

    /// Time of the write that produced the current value (None = never written)
    last_updated: Option<DateTime<Utc>>,

    clock: Arc<dyn Clock>,
}

impl TimestampedStorage {
    pub fn new(address: Address, clock: Arc<dyn Clock>) -> Self {
        TimestampedStorage {
            inner: SimpleStorage::new(address),
            last_updated: None,
            clock,
        }
    }

    /// Rebuild from persisted state
    pub fn restore(
        address: Address,
        value: Uint,
        last_updated: Option<DateTime<Utc>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        TimestampedStorage {
            inner: SimpleStorage::restore(address, value),
            last_updated,
            clock,
        }
    }

    pub fn address(&self) -> Address {
        self.inner.address
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Unix seconds of the last write, 0 if never written
    pub fn last_updated_unix(&self) -> i64 {
        self.last_updated.map_or(0, |t| t.timestamp())
    }
}

impl ValueStore for TimestampedStorage {
    fn set(&mut self, value: Uint) {
        self.inner.set(value);

        let now = self.clock.now();
        let stamped = match self.last_updated {
            Some(previous) if now < previous => {
                warn!(
                    contract = %self.inner.address,
                    %previous, %now,
                    "clock went backwards, keeping previous timestamp"
                );
                previous
            }
            _ => now,
        };
        debug!(contract = %self.inner.address, at = %stamped, "timestamp recorded");
        self.last_updated = Some(stamped);
    }

    fn get(&self) -> Uint {
        self.inner.get()
    }
}

impl fmt::Debug for TimestampedStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimestampedStorage")
            .field("address", &self.inner.address)
            .field("value", &self.inner.get())
            .field("last_updated", &self.last_updated)
            .finish()
    }
}
