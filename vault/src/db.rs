//! SQLite connection setup shared by the backup store and the audit log.

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

use crate::error::BackupResult;

pub(crate) type SharedConnection = Arc<Mutex<Connection>>;

/// Open (or create) the backup database and apply the standing pragmas.
pub(crate) fn open<P: AsRef<Path>>(path: P) -> BackupResult<SharedConnection> {
    configure(Connection::open(path)?)
}

/// In-memory database for tests and ephemeral use.
pub(crate) fn open_in_memory() -> BackupResult<SharedConnection> {
    configure(Connection::open_in_memory()?)
}

fn configure(conn: Connection) -> BackupResult<SharedConnection> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(Arc::new(Mutex::new(conn)))
}
