//! Registration and login verification over an [`AccountRepository`].

use super::{Account, AccountRepository, AuthError};
use std::sync::Arc;

/// Maximum username length after trimming.
pub const MAX_USERNAME_LEN: usize = 64;

/// Plaintext hashed once at construction so lookup misses pay the same
/// bcrypt cost as a real comparison.
const TIMING_DECOY_PASSWORD: &str = "stockmaster-timing-decoy";

/// Registers accounts and verifies login attempts.
pub struct CredentialStore {
    repo: Arc<dyn AccountRepository>,
    bcrypt_cost: u32,
    min_password_len: usize,
    decoy_hash: String,
}

impl CredentialStore {
    /// Build a store hashing at `bcrypt_cost` (4..=31).
    pub fn new(
        repo: Arc<dyn AccountRepository>,
        bcrypt_cost: u32,
        min_password_len: usize,
    ) -> Result<Self, AuthError> {
        let decoy_hash = bcrypt::hash(TIMING_DECOY_PASSWORD, bcrypt_cost)?;
        Ok(Self {
            repo,
            bcrypt_cost,
            min_password_len: min_password_len.max(1),
            decoy_hash,
        })
    }

    /// Register a new account. Only the bcrypt hash of the password is stored.
    pub fn register(&self, username: &str, password: &str) -> Result<Account, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::InvalidUsername("username cannot be empty"));
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(AuthError::InvalidUsername(
                "username too long (max 64 characters)",
            ));
        }
        if password.chars().count() < self.min_password_len {
            return Err(AuthError::WeakPassword {
                min: self.min_password_len,
            });
        }

        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: bcrypt::hash(password, self.bcrypt_cost)?,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.repo.insert(&account)?;

        tracing::info!(user_id = %account.id, username = %account.username, "Account registered");
        Ok(account)
    }

    /// Check a login attempt. Unknown usernames and wrong passwords both
    /// yield [`AuthError::InvalidCredentials`].
    pub fn verify(&self, username: &str, password: &str) -> Result<Account, AuthError> {
        let Some(account) = self.repo.find_by_username(username.trim())? else {
            // Perform dummy hash to prevent timing side-channel
            let _ = bcrypt::verify(password, &self.decoy_hash);
            tracing::debug!("Login rejected: unknown username");
            return Err(AuthError::InvalidCredentials);
        };

        // A corrupt stored hash is reported the same way as a mismatch.
        if !bcrypt::verify(password, &account.password_hash).unwrap_or(false) {
            tracing::debug!(user_id = %account.id, "Login rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(account)
    }
}
