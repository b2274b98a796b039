use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;

use contract_primer::{setup_database, with_chain, Address, Chain, Config, SystemClock, Uint};

/// Call the demo contracts from the command line
#[derive(Parser, Debug)]
#[command(name = "contract-primer", version, about)]
struct Cli {
    /// SQLite file holding chain state (overrides config and PRIMER_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// SimpleStorage.set
    Set { value: Uint },
    /// SimpleStorage.get
    Get,
    /// TimestampedStorage.set
    StampSet { value: Uint },
    /// TimestampedStorage.get (value and last write time)
    StampGet,
    /// StorageFactory.deployInstance
    Deploy,
    /// StorageFactory.setAt
    SetAt { index: usize, value: Uint },
    /// StorageFactory.getAt
    GetAt { index: usize },
    /// List factory children
    Instances,
    /// Child.combinedGreeting
    Greet,
    /// Print the audit trail
    Events {
        /// Only events for this contract
        #[arg(long)]
        contract: Option<Address>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let conn = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    setup_database(&conn).context("Failed to set up database")?;

    // Load, run and save under one write lock; print only once committed
    let output = with_chain(&conn, Arc::new(SystemClock), &config.actor, |chain| {
        run(chain, cli.command)
    })?;
    for line in output {
        println!("{}", line);
    }

    Ok(())
}

fn run(chain: &mut Chain, command: Command) -> Result<Vec<String>> {
    let mut out = Vec::new();

    match command {
        Command::Set { value } => {
            chain.store_set(value);
            out.push(format!("✓ SimpleStorage = {}", value));
        }
        Command::Get => {
            out.push(chain.store_get().to_string());
        }
        Command::StampSet { value } => {
            chain.stamped_set(value);
            let at = chain
                .stamped_last_updated()
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            out.push(format!("✓ TimestampedStorage = {} at {}", value, at));
        }
        Command::StampGet => {
            out.push(match chain.stamped_last_updated() {
                Some(at) => format!("{} (last updated {})", chain.stamped_get(), at.to_rfc3339()),
                None => format!("{} (never written)", chain.stamped_get()),
            });
        }
        Command::Deploy => {
            let address = chain.factory_deploy();
            out.push(format!("✓ Deployed instance #{} at {}", chain.factory_len() - 1, address));
        }
        Command::SetAt { index, value } => {
            chain
                .factory_set_at(index, value)
                .with_context(|| format!("setAt({}) failed", index))?;
            out.push(format!("✓ Instance #{} = {}", index, value));
        }
        Command::GetAt { index } => {
            let value = chain
                .factory_get_at(index)
                .with_context(|| format!("getAt({}) failed", index))?;
            out.push(value.to_string());
        }
        Command::Instances => {
            let addresses = chain.factory().addresses();
            if addresses.is_empty() {
                out.push("No instances deployed".to_string());
            }
            for (index, address) in addresses.iter().enumerate() {
                let value = chain.factory_get_at(index)?;
                out.push(format!("#{:<4} {}  {}", index, address, value));
            }
        }
        Command::Greet => {
            out.push(chain.greeting());
        }
        Command::Events { contract } => {
            let events: Vec<_> = match contract {
                Some(address) => chain.events_for(&address),
                None => chain.events().iter().collect(),
            };
            for event in events {
                out.push(format!(
                    "{}  {:<20} {}  {}  by {}",
                    event.timestamp.to_rfc3339(),
                    event.event_type.as_str(),
                    event.contract,
                    event.data,
                    event.actor
                ));
            }
        }
    }

    Ok(out)
}
