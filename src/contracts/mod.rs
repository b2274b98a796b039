// Demo contracts
//
// Four minimal contracts, each a plain Rust type:
// - SimpleStorage: one stored integer
// - TimestampedStorage: SimpleStorage plus the time of the last write
// - StorageFactory: deploys and indexes SimpleStorage children
// - Child: combines two independent greeters (Parent1, Parent2)

pub mod simple_storage;
pub mod timestamped;
pub mod factory;
pub mod greeting;

pub use simple_storage::SimpleStorage;
pub use timestamped::TimestampedStorage;
pub use factory::StorageFactory;
pub use greeting::{Child, Greeter, Parent1, Parent2, GREETING_SEPARATOR};

/// Unsigned integer held by storage contracts
pub type Uint = u128;

/// A contract that stores a single integer
///
/// SimpleStorage implements this directly. TimestampedStorage wraps a
/// SimpleStorage and overrides `set` to also record the write time.
pub trait ValueStore {
    /// Replace the stored value. Always succeeds.
    fn set(&mut self, value: Uint);

    /// Current stored value (zero before the first write)
    fn get(&self) -> Uint;
}
