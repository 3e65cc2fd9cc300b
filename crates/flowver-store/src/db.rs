//! Database connection management
//!
//! SQLite connections are not shared across threads here: [`Database`]
//! hands out a freshly configured connection per unit of work.

use crate::config::StoreConfig;
use crate::errors::{from_rusqlite, Result};
use crate::migrations::apply_migrations;
use rusqlite::Connection;
use std::time::Duration;

/// Open an in-memory SQLite database (for testing)
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().map_err(from_rusqlite)?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(from_rusqlite)?;
    Ok(conn)
}

/// Apply connection pragmas from `config`
pub fn configure(conn: &Connection, config: &StoreConfig) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(from_rusqlite)?;

    // journal_mode reports the resulting mode as a row
    let _mode: String = conn
        .pragma_update_and_check(None, "journal_mode", config.journal_mode.pragma_value(), |row| {
            row.get(0)
        })
        .map_err(from_rusqlite)?;

    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(from_rusqlite)?;

    Ok(())
}

/// Handle to one SQLite database file
#[derive(Debug, Clone)]
pub struct Database {
    config: StoreConfig,
}

impl Database {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open a new configured connection
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.config.path).map_err(from_rusqlite)?;
        configure(&conn, &self.config)?;
        Ok(conn)
    }

    /// Open a connection and bring the schema up to date
    pub fn initialize(&self) -> Result<Connection> {
        let mut conn = self.connect()?;
        apply_migrations(&mut conn)?;
        tracing::debug!(path = %self.config.path.display(), "Database initialized");
        Ok(conn)
    }
}
