//! Stateless HS256 bearer tokens.
//!
//! A token is a three-segment JWT carrying `sub`, `iss`, `aud`, `iat` and
//! `exp`. Nothing is persisted server-side: a token lives until its signed
//! expiry or until the client discards it.
//!
//! Validation order is fixed: signature, then issuer/audience, then expiry.

use super::{Account, AuthError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default token lifetime: 24 hours.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 3600);

/// HS256 keys shorter than the digest size are rejected.
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

/// Settings the token service is built from. Read-only for the process
/// lifetime.
#[derive(Clone)]
pub struct TokenConfig {
    pub signing_key: Vec<u8>,
    pub issuer: String,
    pub audience: String,
    pub lifetime: Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("signing_key", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Claims carried by every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username of the authenticated account.
    pub sub: String,
    pub iss: String,
    pub aud: String,
    /// Issued-at, Unix seconds.
    pub iat: u64,
    /// Expiry, Unix seconds. The token is valid while `now < exp`.
    pub exp: u64,
}

/// A freshly signed token together with its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
}

/// Issues and validates bearer tokens under one symmetric key.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    lifetime_secs: u64,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> anyhow::Result<Self> {
        if config.signing_key.len() < MIN_SIGNING_KEY_BYTES {
            anyhow::bail!(
                "signing key must be at least {MIN_SIGNING_KEY_BYTES} bytes (got {})",
                config.signing_key.len()
            );
        }
        if config.lifetime.is_zero() {
            anyhow::bail!("token lifetime must be greater than zero");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        // expiry is checked after issuer/audience against an explicit clock
        validation.validate_exp = false;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&config.signing_key),
            decoding_key: DecodingKey::from_secret(&config.signing_key),
            validation,
            issuer: config.issuer,
            audience: config.audience,
            lifetime_secs: config.lifetime.as_secs(),
        })
    }

    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime_secs
    }

    /// Sign a token for `account`, valid for the configured lifetime.
    pub fn issue(&self, account: &Account) -> Result<IssuedToken, AuthError> {
        self.issue_at(account, now_secs())
    }

    /// Same as [`issue`](Self::issue) with an explicit issued-at time.
    pub fn issue_at(&self, account: &Account, now: u64) -> Result<IssuedToken, AuthError> {
        let claims = Claims {
            sub: account.username.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp: now.saturating_add(self.lifetime_secs),
        };
        let header = Header::new(Algorithm::HS256);
        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(AuthError::Signing)?;

        tracing::debug!(subject = %claims.sub, expires_at = claims.exp, "Token issued");
        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Check a scheme-stripped bearer token and return its claims.
    /// Read-only: validating the same token twice yields the same claims.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate_at(token, now_secs())
    }

    /// Same as [`validate`](Self::validate) with an explicit current time.
    pub fn validate_at(&self, token: &str, now: u64) -> Result<Claims, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => {
                    AuthError::InvalidIssuerOrAudience
                }
                ErrorKind::MissingRequiredClaim(claim) if claim == "iss" || claim == "aud" => {
                    AuthError::InvalidIssuerOrAudience
                }
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidSignature,
            })?;

        if now >= data.claims.exp {
            return Err(AuthError::Expired);
        }
        Ok(data.claims)
    }
}

/// Current Unix epoch in seconds.
fn now_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}
