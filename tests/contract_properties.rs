// Property tests for the demo contracts and the chain host

use chrono::{Duration, TimeZone, Utc};
use contract_primer::{
    load_chain, save_chain, setup_database, with_chain, Address, Chain, Child, Clock, ContractError,
    EventType, ManualClock, SimpleStorage, StorageFactory, TimestampedStorage, Uint, ValueStore,
};
use proptest::prelude::*;
use rusqlite::Connection;
use std::sync::Arc;

fn manual_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
}

proptest! {
    #[test]
    fn set_then_get_returns_value(values in proptest::collection::vec(any::<u128>(), 1..20)) {
        let mut storage = SimpleStorage::new(Address::ZERO);
        for v in &values {
            storage.set(*v);
            prop_assert_eq!(storage.get(), *v);
        }
        prop_assert_eq!(storage.get(), *values.last().unwrap());
    }

    #[test]
    fn registry_size_matches_deployments(n in 0usize..40) {
        let mut factory = StorageFactory::new(Address::derive(&Address::ZERO, 2));
        for _ in 0..n {
            factory.deploy_instance();
        }
        prop_assert_eq!(factory.len(), n);

        // Addresses are unique
        let mut addresses = factory.addresses();
        addresses.sort();
        addresses.dedup();
        prop_assert_eq!(addresses.len(), n);
    }

    #[test]
    fn set_at_then_get_at(n in 1usize..10, index_seed in any::<usize>(), value in any::<u128>()) {
        let mut factory = StorageFactory::new(Address::ZERO);
        for _ in 0..n {
            factory.deploy_instance();
        }
        let index = index_seed % n;
        factory.set_at(index, value).unwrap();
        prop_assert_eq!(factory.get_at(index).unwrap(), value);
    }

    #[test]
    fn out_of_range_fails_without_mutation(n in 0usize..10, past_end in 0usize..10, value in any::<u128>()) {
        let mut factory = StorageFactory::new(Address::ZERO);
        for i in 0..n {
            factory.deploy_instance();
            factory.set_at(i, i as Uint).unwrap();
        }
        let before = factory.clone();
        let index = n + past_end;

        let get_is_oob = matches!(
            factory.get_at(index),
            Err(ContractError::IndexOutOfBounds { .. })
        );
        let set_is_oob = matches!(
            factory.set_at(index, value),
            Err(ContractError::IndexOutOfBounds { .. })
        );
        prop_assert!(get_is_oob);
        prop_assert!(set_is_oob);
        prop_assert_eq!(factory, before);
    }

    #[test]
    fn timestamp_is_monotonic(steps in proptest::collection::vec(-120i64..120, 1..30)) {
        let clock = manual_clock();
        let mut storage = TimestampedStorage::new(Address::ZERO, Arc::new(clock.clone()));
        let mut previous = None;

        for (i, step) in steps.iter().enumerate() {
            clock.advance(Duration::seconds(*step));
            storage.set(i as Uint);

            let recorded = storage.last_updated().unwrap();
            if let Some(prev) = previous {
                prop_assert!(recorded >= prev);
            }
            prop_assert_eq!(storage.get(), i as Uint);
            previous = Some(recorded);
        }
    }
}

#[test]
fn test_combined_greeting_literal() {
    assert_eq!(
        Child::new().combined_greeting(),
        "Hello from Parent1 + Hello from Parent2"
    );
}

#[test]
fn test_chain_survives_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("primer.db");
    let clock = manual_clock();

    {
        let conn = Connection::open(&path).unwrap();
        setup_database(&conn).unwrap();
        let mut chain = Chain::new(Arc::new(clock.clone())).with_actor("alice");
        chain.store_set(1234);
        clock.advance(Duration::seconds(10));
        chain.stamped_set(5678);
        chain.factory_deploy();
        chain.factory_deploy();
        chain.factory_set_at(0, 9).unwrap();
        save_chain(&conn, &mut chain).unwrap();
    }

    let conn = Connection::open(&path).unwrap();
    setup_database(&conn).unwrap();
    let mut chain = load_chain(&conn, Arc::new(clock.clone())).unwrap().unwrap();

    assert_eq!(chain.store_get(), 1234);
    assert_eq!(chain.stamped_get(), 5678);
    assert_eq!(chain.stamped_last_updated(), Some(clock.now()));
    assert_eq!(chain.factory_len(), 2);
    assert_eq!(chain.factory_get_at(0).unwrap(), 9);
    assert_eq!(chain.factory_get_at(1).unwrap(), 0);

    // Continue where we left off
    let third = chain.factory_deploy();
    assert_eq!(third, Address::derive(&chain.factory().address, 2));
    save_chain(&conn, &mut chain).unwrap();

    let reloaded = load_chain(&conn, Arc::new(clock)).unwrap().unwrap();
    assert_eq!(reloaded.factory_len(), 3);
    assert_eq!(reloaded.events().len(), chain.events().len());
}

#[test]
fn test_overlapping_deploys_keep_registry_and_log_in_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("primer.db");
    let clock: Arc<dyn Clock> = Arc::new(manual_clock());

    let first = Connection::open(&path).unwrap();
    setup_database(&first).unwrap();
    let second = Connection::open(&path).unwrap();

    // Both callers go through the locked path, interleaved
    for conn in [&first, &second, &first] {
        with_chain(conn, clock.clone(), "cli", |chain| {
            chain.factory_deploy();
            Ok::<_, ContractError>(())
        })
        .unwrap();
    }

    // A caller holding a stale copy cannot overwrite the newer state
    let mut stale = load_chain(&second, clock.clone()).unwrap().unwrap();
    with_chain(&first, clock.clone(), "cli", |chain| {
        chain.factory_deploy();
        Ok::<_, ContractError>(())
    })
    .unwrap();
    stale.factory_deploy();
    assert!(matches!(
        save_chain(&second, &mut stale),
        Err(ContractError::StaleState { .. })
    ));

    let chain = load_chain(&first, clock).unwrap().unwrap();
    let deploy_events = chain
        .events()
        .iter()
        .filter(|e| e.event_type == EventType::InstanceDeployed)
        .count();
    assert_eq!(chain.factory_len(), 4);
    assert_eq!(chain.factory_len(), deploy_events);
}
