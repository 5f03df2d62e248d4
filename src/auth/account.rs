//! Account record and the storage seam the credential store depends on.

use super::AuthError;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A registered user.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub username: String,
    /// bcrypt output (algorithm, cost, salt and digest in one string).
    pub password_hash: String,
    pub created_at: i64,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Case-folded form of a username. Two usernames name the same account
/// exactly when their keys are equal. Full Unicode lowercasing, so
/// `"Élodie"` and `"élodie"` collide.
pub fn username_key(username: &str) -> String {
    username.to_lowercase()
}

/// Lookup-by-username and insert, provided by a persistence backend.
///
/// Implementations must compare usernames by [`username_key`] and must
/// reject an insert whose username is already present with
/// [`AuthError::DuplicateUsername`] rather than overwrite it.
pub trait AccountRepository: Send + Sync {
    fn insert(&self, account: &Account) -> Result<(), AuthError>;

    fn find_by_username(&self, username: &str) -> Result<Option<Account>, AuthError>;
}

/// Process-local repository. Used by tests and by embedders that bring
/// their own persistence.
#[derive(Debug, Default)]
pub struct InMemoryAccountRepository {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

impl AccountRepository for InMemoryAccountRepository {
    fn insert(&self, account: &Account) -> Result<(), AuthError> {
        let key = username_key(&account.username);
        let mut accounts = self.accounts.write();
        if accounts.contains_key(&key) {
            return Err(AuthError::DuplicateUsername(account.username.clone()));
        }
        accounts.insert(key, account.clone());
        Ok(())
    }

    fn find_by_username(&self, username: &str) -> Result<Option<Account>, AuthError> {
        Ok(self.accounts.read().get(&username_key(username)).cloned())
    }
}
