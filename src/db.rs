//! The single SQLite database file shared by accounts and products.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// One connection handed to every store that lives in the same file.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Open (or create) the database at `db_path`, creating parent directories.
pub fn open(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;

    // WAL mode for concurrent reads + crash safety
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )
    .context("configuring database")?;
    Ok(conn)
}

/// [`open`], wrapped for sharing between stores.
pub fn open_shared(db_path: &Path) -> Result<SharedConnection> {
    Ok(Arc::new(Mutex::new(open(db_path)?)))
}
