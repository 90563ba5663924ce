pub mod config;
pub mod message;
pub mod push;

use chrono::{DateTime, FixedOffset};
use std::sync::Arc;

use coachroom_core::storage::{KeyValueStore, LEDGER_KEY, MESSAGES_KEY};
use coachroom_core::{Clock, Config, FixedClock, Ledger, MessageCenter, SqliteStore, SystemClock};

/// Everything a command needs: config, clock, and the two hydrated
/// aggregates sharing one SQLite store.
pub struct Session {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub ledger: Ledger,
    pub center: MessageCenter,
}

fn open_store(config: &Config) -> Result<Arc<SqliteStore>, Box<dyn std::error::Error>> {
    let path = config.database_path()?;
    Ok(Arc::new(SqliteStore::open(&path)?))
}

pub async fn open_session(at: Option<DateTime<FixedOffset>>) -> Result<Session, Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let store = open_store(&config)?;
    let clock: Arc<dyn Clock> = match at {
        Some(at) => Arc::new(FixedClock::new(at)),
        None => Arc::new(SystemClock),
    };
    let ledger = Ledger::load(store.clone(), clock.clone()).await;
    let center = MessageCenter::load(store, clock.clone()).await;
    Ok(Session {
        config,
        clock,
        ledger,
        center,
    })
}

pub async fn reset() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let store = open_store(&config)?;
    store.remove(LEDGER_KEY).await?;
    store.remove(MESSAGES_KEY).await?;
    println!("coaching data reset");
    Ok(())
}
