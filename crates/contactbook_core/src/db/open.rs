//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by membership cascades.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Upper bound a connection waits on a locked database before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a connection should point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenMode {
    File(PathBuf),
    Memory,
}

impl OpenMode {
    fn label(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        match self {
            Self::File(path) => Connection::open(path),
            Self::Memory => Connection::open_in_memory(),
        }
    }

    /// Opens the connection, configures it and applies pending migrations.
    ///
    /// # Side effects
    /// - Emits `db_open` logging events with duration and status.
    pub fn open(&self) -> DbResult<Connection> {
        let started_at = Instant::now();
        let mode = self.label();
        info!("event=db_open module=db status=start mode={mode}");

        let result = self
            .connect()
            .map_err(DbError::from)
            .map_err(|err| ("db_open_failed", err))
            .and_then(|mut conn| {
                bootstrap_connection(&mut conn)
                    .map(|()| conn)
                    .map_err(|err| ("db_bootstrap_failed", err))
            });

        match result {
            Ok(conn) => {
                info!(
                    "event=db_open module=db status=ok mode={mode} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(conn)
            }
            Err((error_code, err)) => {
                error!(
                    "event=db_open module=db status=error mode={mode} duration_ms={} error_code={error_code} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }
}

/// Opens a SQLite database file and applies all pending migrations.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    OpenMode::File(path.as_ref().to_path_buf()).open()
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    OpenMode::Memory.open()
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    let enabled: i64 = conn.query_row("PRAGMA foreign_keys;", [], |row| row.get(0))?;
    if enabled != 1 {
        return Err(DbError::ForeignKeysUnavailable);
    }
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)?;
    Ok(())
}
