//! SQLite-backed account repository.
//!
//! Tables:
//! - `users`: id, username (as registered), username_key (unique,
//!   case-folded), password_hash, created_at

use super::{username_key, Account, AccountRepository, AuthError};
use crate::db::{self, SharedConnection};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

/// Accounts persisted in a single SQLite database file.
pub struct SqliteAccountRepository {
    conn: SharedConnection,
}

impl SqliteAccountRepository {
    /// Open (or create) the account database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        Self::with_shared(db::open_shared(db_path)?)
    }

    /// Wrap an already-open connection, creating the schema if needed.
    pub fn with_connection(conn: Connection) -> Result<Self> {
        Self::with_shared(Arc::new(Mutex::new(conn)))
    }

    /// Use a connection that other stores hold too.
    pub fn with_shared(conn: SharedConnection) -> Result<Self> {
        // SQLite's NOCASE folds ASCII only; uniqueness lives on the Rust-side key.
        conn.lock()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    username TEXT NOT NULL,
                    username_key TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );",
            )
            .context("creating users table")?;

        Ok(Self { conn })
    }

    /// Count registered accounts.
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl AccountRepository for SqliteAccountRepository {
    fn insert(&self, account: &Account) -> Result<(), AuthError> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (id, username, username_key, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.id,
                account.username,
                username_key(&account.username),
                account.password_hash,
                account.created_at
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(AuthError::DuplicateUsername(account.username.clone()))
            }
            Err(e) => Err(anyhow::Error::new(e).context("inserting account").into()),
        }
    }

    fn find_by_username(&self, username: &str) -> Result<Option<Account>, AuthError> {
        let conn = self.conn.lock();
        let account = conn
            .query_row(
                "SELECT id, username, password_hash, created_at
                 FROM users WHERE username_key = ?1",
                params![username_key(username)],
                |row| {
                    Ok(Account {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password_hash: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("looking up account")?;
        Ok(account)
    }
}
