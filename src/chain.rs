// ⛓️ Chain - in-process host for the demo contracts
//
// Owns one deployed instance of each demo contract, supplies block time,
// and records an Event for every successful state change. Calls take
// &mut self, so writes are serialized by whoever owns the Chain.

use crate::address::Address;
use crate::clock::Clock;
use crate::contracts::{Child, SimpleStorage, StorageFactory, TimestampedStorage, Uint, ValueStore};
use crate::error::Result;
use crate::event::{Event, EventType};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_ACTOR: &str = "deployer";

/// Deployment nonces of the demo contracts under Address::ZERO
const STORAGE_NONCE: u64 = 0;
const TIMESTAMPED_NONCE: u64 = 1;
const FACTORY_NONCE: u64 = 2;
const GREETER_NONCE: u64 = 3;

/// Everything needed to rebuild a Chain (used by persistence)
#[derive(Debug, Clone)]
pub struct ChainState {
    pub storage_value: Uint,
    pub timestamped_value: Uint,
    pub timestamped_last_updated: Option<DateTime<Utc>>,
    pub factory_children: Vec<SimpleStorage>,
    pub events: Vec<Event>,
}

/// Contract state captured before a call, for undoing it
#[derive(Debug, Clone)]
pub struct Checkpoint {
    storage: SimpleStorage,
    timestamped: TimestampedStorage,
    factory: StorageFactory,
    events_len: usize,
}

pub struct Chain {
    clock: Arc<dyn Clock>,
    actor: String,
    storage: SimpleStorage,
    timestamped: TimestampedStorage,
    factory: StorageFactory,
    greeter: Child,
    greeter_address: Address,
    events: Vec<Event>,
    /// Leading events already written to the database
    persisted_events: usize,
}

impl Chain {
    /// Deploy the four demo contracts on a fresh chain
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let mut chain = Self::assemble(clock, Vec::new());

        for (name, address) in chain.contracts() {
            chain.emit(
                EventType::ContractDeployed,
                address,
                serde_json::json!({ "contract": name }),
            );
        }
        info!(contracts = chain.contracts().len(), "chain initialized");
        chain
    }

    /// Rebuild a chain from persisted state (no deployment events emitted)
    pub fn restore(clock: Arc<dyn Clock>, state: ChainState) -> Self {
        let mut chain = Self::assemble(clock.clone(), state.events);
        chain.storage = SimpleStorage::restore(chain.storage.address, state.storage_value);
        chain.timestamped = TimestampedStorage::restore(
            chain.timestamped.address(),
            state.timestamped_value,
            state.timestamped_last_updated,
            clock,
        );
        chain.factory = StorageFactory::restore(chain.factory.address, state.factory_children);
        chain.persisted_events = chain.events.len();
        debug!(
            children = chain.factory.len(),
            events = chain.events.len(),
            "chain restored"
        );
        chain
    }

    fn assemble(clock: Arc<dyn Clock>, events: Vec<Event>) -> Self {
        let storage = Address::derive(&Address::ZERO, STORAGE_NONCE);
        let timestamped = Address::derive(&Address::ZERO, TIMESTAMPED_NONCE);
        let factory = Address::derive(&Address::ZERO, FACTORY_NONCE);
        let greeter = Address::derive(&Address::ZERO, GREETER_NONCE);

        Chain {
            timestamped: TimestampedStorage::new(timestamped, clock.clone()),
            clock,
            actor: DEFAULT_ACTOR.to_string(),
            storage: SimpleStorage::new(storage),
            factory: StorageFactory::new(factory),
            greeter: Child::new(),
            greeter_address: greeter,
            events,
            persisted_events: 0,
        }
    }

    /// Name recorded as `actor` on subsequent events
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Demo contracts by name, in deployment order
    pub fn contracts(&self) -> Vec<(&'static str, Address)> {
        vec![
            ("SimpleStorage", self.storage.address),
            ("TimestampedStorage", self.timestamped.address()),
            ("StorageFactory", self.factory.address),
            ("Child", self.greeter_address),
        ]
    }

    // ========================================================================
    // SimpleStorage
    // ========================================================================

    pub fn store_set(&mut self, value: Uint) {
        self.storage.set(value);
        let address = self.storage.address;
        self.emit(
            EventType::ValueSet,
            address,
            serde_json::json!({ "value": value.to_string() }),
        );
    }

    pub fn store_get(&self) -> Uint {
        self.storage.get()
    }

    // ========================================================================
    // TimestampedStorage
    // ========================================================================

    pub fn stamped_set(&mut self, value: Uint) {
        self.timestamped.set(value);
        let address = self.timestamped.address();
        let at = self.timestamped.last_updated();
        self.emit(
            EventType::TimestampedValueSet,
            address,
            serde_json::json!({ "value": value.to_string(), "last_updated": at }),
        );
    }

    pub fn stamped_get(&self) -> Uint {
        self.timestamped.get()
    }

    pub fn stamped_last_updated(&self) -> Option<DateTime<Utc>> {
        self.timestamped.last_updated()
    }

    // ========================================================================
    // StorageFactory
    // ========================================================================

    pub fn factory_deploy(&mut self) -> Address {
        let child = self.factory.deploy_instance();
        let index = self.factory.len() - 1;
        let factory = self.factory.address;
        self.emit(
            EventType::InstanceDeployed,
            factory,
            serde_json::json!({ "index": index, "instance": child }),
        );
        child
    }

    pub fn factory_set_at(&mut self, index: usize, value: Uint) -> Result<()> {
        self.factory.set_at(index, value)?;
        let factory = self.factory.address;
        self.emit(
            EventType::InstanceValueSet,
            factory,
            serde_json::json!({ "index": index, "value": value.to_string() }),
        );
        Ok(())
    }

    pub fn factory_get_at(&self, index: usize) -> Result<Uint> {
        self.factory.get_at(index)
    }

    pub fn factory_len(&self) -> usize {
        self.factory.len()
    }

    pub fn factory(&self) -> &StorageFactory {
        &self.factory
    }

    // ========================================================================
    // Child (multiple-inheritance demo)
    // ========================================================================

    pub fn greeting(&self) -> String {
        self.greeter.combined_greeting()
    }

    // ========================================================================
    // Audit trail
    // ========================================================================

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn events_for(&self, contract: &Address) -> Vec<&Event> {
        self.events.iter().filter(|e| &e.contract == contract).collect()
    }

    /// Events not yet written to the database
    pub fn unsaved_events(&self) -> &[Event] {
        &self.events[self.persisted_events..]
    }

    pub fn persisted_events(&self) -> usize {
        self.persisted_events
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted_events = self.events.len();
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            storage: self.storage.clone(),
            timestamped: self.timestamped.clone(),
            factory: self.factory.clone(),
            events_len: self.events.len(),
        }
    }

    /// Undo every call made since `checkpoint`
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.storage = checkpoint.storage;
        self.timestamped = checkpoint.timestamped;
        self.factory = checkpoint.factory;
        self.events.truncate(checkpoint.events_len.max(self.persisted_events));
        debug!(events = self.events.len(), "chain rolled back");
    }

    /// Snapshot for persistence
    pub fn state(&self) -> ChainState {
        ChainState {
            storage_value: self.storage.get(),
            timestamped_value: self.timestamped.get(),
            timestamped_last_updated: self.timestamped.last_updated(),
            factory_children: self.factory.instances().to_vec(),
            events: self.events.clone(),
        }
    }

    fn emit(&mut self, event_type: EventType, contract: Address, data: serde_json::Value) {
        let event = Event::new(event_type, contract, data, &self.actor, self.clock.now());
        info!(
            event = event_type.as_str(),
            %contract,
            actor = %self.actor,
            "state changed"
        );
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ContractError;
    use chrono::{Duration, TimeZone};

    fn setup() -> (Chain, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
        let chain = Chain::new(Arc::new(clock.clone())).with_actor("tester");
        (chain, clock)
    }

    #[test]
    fn test_new_chain_deploys_four_contracts() {
        let (chain, _) = setup();

        let contracts = chain.contracts();
        assert_eq!(contracts.len(), 4);
        assert_eq!(chain.events().len(), 4);
        assert!(chain
            .events()
            .iter()
            .all(|e| e.event_type == EventType::ContractDeployed));

        assert_eq!(chain.store_get(), 0);
        assert_eq!(chain.stamped_get(), 0);
        assert_eq!(chain.factory_len(), 0);
    }

    #[test]
    fn test_store_set_emits_event() {
        let (mut chain, _) = setup();
        chain.store_set(42);

        assert_eq!(chain.store_get(), 42);
        let last = chain.events().last().unwrap();
        assert_eq!(last.event_type, EventType::ValueSet);
        assert_eq!(last.actor, "tester");
        assert_eq!(last.data["value"], "42");
    }

    #[test]
    fn test_stamped_set_uses_chain_clock() {
        let (mut chain, clock) = setup();
        clock.advance(Duration::minutes(5));
        chain.stamped_set(8);

        assert_eq!(chain.stamped_get(), 8);
        assert_eq!(chain.stamped_last_updated(), Some(clock.now()));
        assert_eq!(chain.events().last().unwrap().timestamp, clock.now());
    }

    #[test]
    fn test_factory_calls() {
        let (mut chain, _) = setup();
        let first = chain.factory_deploy();
        chain.factory_deploy();

        chain.factory_set_at(1, 500).unwrap();
        assert_eq!(chain.factory_get_at(1).unwrap(), 500);
        assert_eq!(chain.factory_get_at(0).unwrap(), 0);
        assert_eq!(chain.factory().addresses()[0], first);
    }

    #[test]
    fn test_rejected_call_emits_nothing() {
        let (mut chain, _) = setup();
        chain.factory_deploy();
        let events_before = chain.events().len();

        let err = chain.factory_set_at(3, 1).unwrap_err();
        assert!(matches!(err, ContractError::IndexOutOfBounds { index: 3, len: 1 }));
        assert!(chain.factory_get_at(1).is_err());

        assert_eq!(chain.events().len(), events_before);
        assert_eq!(chain.factory_get_at(0).unwrap(), 0);
    }

    #[test]
    fn test_events_for_contract() {
        let (mut chain, _) = setup();
        chain.store_set(1);
        chain.store_set(2);
        chain.factory_deploy();

        let storage = chain.contracts()[0].1;
        let factory = chain.factory().address;

        // Deployment + two writes
        assert_eq!(chain.events_for(&storage).len(), 3);
        assert_eq!(chain.events_for(&factory).len(), 2);
    }

    #[test]
    fn test_restore_round_trip() {
        let (mut chain, clock) = setup();
        chain.store_set(10);
        chain.stamped_set(20);
        chain.factory_deploy();
        chain.factory_set_at(0, 30).unwrap();

        let restored = Chain::restore(Arc::new(clock.clone()), chain.state());

        assert_eq!(restored.store_get(), 10);
        assert_eq!(restored.stamped_get(), 20);
        assert_eq!(restored.stamped_last_updated(), chain.stamped_last_updated());
        assert_eq!(restored.factory_get_at(0).unwrap(), 30);
        assert_eq!(restored.events(), chain.events());
        assert_eq!(restored.contracts(), chain.contracts());
        assert!(restored.unsaved_events().is_empty());
    }

    #[test]
    fn test_rollback_undoes_calls() {
        let (mut chain, _) = setup();
        chain.store_set(1);
        chain.factory_deploy();
        let checkpoint = chain.checkpoint();
        let events_before = chain.events().len();

        chain.store_set(2);
        chain.stamped_set(3);
        chain.factory_deploy();
        chain.factory_set_at(0, 4).unwrap();
        chain.rollback(checkpoint);

        assert_eq!(chain.store_get(), 1);
        assert_eq!(chain.stamped_get(), 0);
        assert!(chain.stamped_last_updated().is_none());
        assert_eq!(chain.factory_len(), 1);
        assert_eq!(chain.factory_get_at(0).unwrap(), 0);
        assert_eq!(chain.events().len(), events_before);
    }

    #[test]
    fn test_unsaved_events_tail() {
        let (mut chain, _) = setup();
        assert_eq!(chain.persisted_events(), 0);
        assert_eq!(chain.unsaved_events().len(), 4);

        chain.mark_persisted();
        chain.store_set(5);
        assert_eq!(chain.unsaved_events().len(), 1);
        assert_eq!(chain.unsaved_events()[0].event_type, EventType::ValueSet);
    }

    #[test]
    fn test_greeting() {
        let (chain, _) = setup();
        assert_eq!(chain.greeting(), "Hello from Parent1 + Hello from Parent2");
    }
}
