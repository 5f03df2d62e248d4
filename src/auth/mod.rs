//! Username/password authentication and bearer-token authorization.
//!
//! Provides:
//! - Account registration with bcrypt-hashed passwords (cost is configurable)
//! - Login verification that does not reveal whether the username exists
//! - Stateless HS256 JWTs with issuer, audience and 24h default expiry
//! - SQLite-backed and in-memory account repositories
//!
//! ## Design Decisions
//! - Tokens are never stored server-side and cannot be revoked before expiry.
//! - The signing key and claims settings arrive through [`TokenConfig`];
//!   nothing is read from global state.
//! - Usernames are unique case-insensitively; the SQLite schema enforces it
//!   with a `UNIQUE COLLATE NOCASE` column so concurrent registrations of the
//!   same name cannot both succeed.

pub mod account;
pub mod credentials;
pub mod error;
pub mod store;
pub mod token;

pub use account::{username_key, Account, AccountRepository, InMemoryAccountRepository};
pub use credentials::CredentialStore;
pub use error::AuthError;
pub use store::SqliteAccountRepository;
pub use token::{Claims, IssuedToken, TokenConfig, TokenService, DEFAULT_TOKEN_TTL};

/// Strip the `Bearer ` scheme from an `Authorization` header value.
pub fn strip_bearer(header_value: &str) -> Option<&str> {
    let token = header_value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
