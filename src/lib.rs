// Contract Primer - Core Library
// Four minimal contracts plus the host, persistence and config around them.
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod address;
pub mod clock;
pub mod contracts;
pub mod event;
pub mod chain;
pub mod db;
pub mod config;

// Re-export commonly used types
pub use error::{ContractError, Result};
pub use address::Address;
pub use clock::{Clock, ManualClock, SystemClock};
pub use contracts::{
    Child, Greeter, Parent1, Parent2, SimpleStorage, StorageFactory, TimestampedStorage,
    Uint, ValueStore,
};
pub use event::{Event, EventType};
pub use chain::{Chain, ChainState, Checkpoint};
pub use db::{
    setup_database, save_chain, load_chain, with_chain,
    insert_event, get_all_events, get_events_for_contract,
};
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
