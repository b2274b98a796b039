use crate::address::Address;
use crate::chain::{Chain, ChainState};
use crate::clock::Clock;
use crate::contracts::{SimpleStorage, Uint, ValueStore};
use crate::error::{ContractError, Result};
use crate::event::{Event, EventType};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::sync::Arc;
use tracing::{debug, warn};

const SIMPLE_STORAGE: &str = "SimpleStorage";
const TIMESTAMPED_STORAGE: &str = "TimestampedStorage";

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery (no-op for in-memory databases)
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Contract state (one row per single-value contract)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contracts (
            name TEXT PRIMARY KEY,
            address TEXT UNIQUE NOT NULL,
            value TEXT NOT NULL,
            last_updated TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Factory children (position = deployment order)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS factory_children (
            position INTEGER PRIMARY KEY,
            address TEXT UNIQUE NOT NULL,
            value TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            contract TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_contract ON events(contract)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Persist the whole chain
///
/// Fails with `StaleState` if another writer saved since this chain was
/// loaded. Only events not yet stored are inserted.
pub fn save_chain(conn: &Connection, chain: &mut Chain) -> Result<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    write_chain(&tx, chain)?;
    tx.commit()?;
    chain.mark_persisted();
    Ok(())
}

/// Run one call against the stored chain under a write lock
///
/// Load, call, and save happen inside a single `BEGIN IMMEDIATE`
/// transaction, so overlapping processes are sequenced. If `call` fails
/// nothing is written.
pub fn with_chain<T, E, F>(
    conn: &Connection,
    clock: Arc<dyn Clock>,
    actor: &str,
    call: F,
) -> std::result::Result<T, E>
where
    F: FnOnce(&mut Chain) -> std::result::Result<T, E>,
    E: From<ContractError>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(ContractError::from)?;

    let chain = match load_chain(&tx, clock.clone())? {
        Some(chain) => chain,
        None => Chain::new(clock),
    };
    let mut chain = chain.with_actor(actor);
    debug!(actor = chain.actor(), "chain locked");

    let output = call(&mut chain)?;

    write_chain(&tx, &chain)?;
    tx.commit().map_err(ContractError::from)?;
    Ok(output)
}

fn write_chain(conn: &Connection, chain: &Chain) -> Result<()> {
    let stored: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
    let stored = stored as usize;
    if stored != chain.persisted_events() {
        warn!(expected = chain.persisted_events(), found = stored, "stale chain rejected");
        return Err(ContractError::StaleState {
            expected: chain.persisted_events(),
            found: stored,
        });
    }

    let state = chain.state();
    for (name, address) in &chain.contracts() {
        let (value, last_updated) = match *name {
            SIMPLE_STORAGE => (state.storage_value, None),
            TIMESTAMPED_STORAGE => (
                state.timestamped_value,
                state.timestamped_last_updated.map(|t| t.to_rfc3339()),
            ),
            _ => continue,
        };
        conn.execute(
            "INSERT INTO contracts (name, address, value, last_updated)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET
                address = excluded.address,
                value = excluded.value,
                last_updated = excluded.last_updated",
            params![name, address.to_hex(), value.to_string(), last_updated],
        )?;
    }

    // Children only ever grow; rewrite values in place
    for (position, child) in state.factory_children.iter().enumerate() {
        conn.execute(
            "INSERT INTO factory_children (position, address, value)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(position) DO UPDATE SET value = excluded.value",
            params![position as i64, child.address.to_hex(), child.get().to_string()],
        )?;
    }

    let unsaved = chain.unsaved_events();
    for event in unsaved {
        insert_event(conn, event)?;
    }

    debug!(
        children = state.factory_children.len(),
        new_events = unsaved.len(),
        "chain saved"
    );
    Ok(())
}

/// Load a previously saved chain. Returns None for an empty database.
pub fn load_chain(conn: &Connection, clock: Arc<dyn Clock>) -> Result<Option<Chain>> {
    let storage: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT value, last_updated FROM contracts WHERE name = ?1",
            params![SIMPLE_STORAGE],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((storage_value, _)) = storage else {
        return Ok(None);
    };

    let (timestamped_value, timestamped_last_updated): (String, Option<String>) = conn
        .query_row(
            "SELECT value, last_updated FROM contracts WHERE name = ?1",
            params![TIMESTAMPED_STORAGE],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .unwrap_or_else(|| ("0".to_string(), None));

    let mut stmt = conn.prepare(
        "SELECT address, value FROM factory_children ORDER BY position ASC",
    )?;
    let factory_children = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .map(|(address, value)| -> Result<SimpleStorage> {
            Ok(SimpleStorage::restore(address.parse()?, parse_uint(&value)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let state = ChainState {
        storage_value: parse_uint(&storage_value)?,
        timestamped_value: parse_uint(&timestamped_value)?,
        timestamped_last_updated: timestamped_last_updated
            .as_deref()
            .map(parse_time)
            .transpose()?,
        factory_children,
        events: get_all_events(conn)?,
    };

    Ok(Some(Chain::restore(clock, state)))
}

/// Insert event into audit trail (ignored if already stored)
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT OR IGNORE INTO events (
            event_id, timestamp, event_type, contract, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type.as_str(),
            event.contract.to_hex(),
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// All events in insertion order
pub fn get_all_events(conn: &Connection) -> Result<Vec<Event>> {
    query_events(
        conn,
        "SELECT event_id, timestamp, event_type, contract, data, actor
         FROM events
         ORDER BY id ASC",
        None,
    )
}

/// Events for a specific contract, newest first
pub fn get_events_for_contract(conn: &Connection, contract: &Address) -> Result<Vec<Event>> {
    query_events(
        conn,
        "SELECT event_id, timestamp, event_type, contract, data, actor
         FROM events
         WHERE contract = ?1
         ORDER BY id DESC",
        Some(contract),
    )
}

type EventRow = (String, String, String, String, String, String);

fn query_events(conn: &Connection, sql: &str, contract: Option<&Address>) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(sql)?;
    let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<EventRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    };

    let rows = match contract {
        Some(address) => stmt
            .query_map(params![address.to_hex()], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
        None => stmt
            .query_map([], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    rows.into_iter()
        .map(|(event_id, timestamp, event_type, contract, data, actor)| -> Result<Event> {
            Ok(Event {
                event_id,
                timestamp: parse_time(&timestamp)?,
                event_type: EventType::parse(&event_type)
                    .ok_or_else(|| ContractError::InvalidValue(event_type.clone()))?,
                contract: contract.parse()?,
                data: serde_json::from_str(&data)?,
                actor,
            })
        })
        .collect()
}

fn parse_uint(s: &str) -> Result<Uint> {
    s.parse()
        .map_err(|_| ContractError::InvalidValue(s.to_string()))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ContractError::InvalidValue(s.to_string()))
}
