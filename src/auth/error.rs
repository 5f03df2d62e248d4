//! Error taxonomy for the authentication core.
//!
//! Every variant is scoped to a single request. None of them is recovered
//! inside the core; the gateway maps them to a rejection (see
//! [`AuthError::is_token_rejection`]).

/// Failure of a credential or token operation.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Registration input rejected before touching storage.
    #[error("invalid username: {0}")]
    InvalidUsername(&'static str),

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    /// A different account already owns this username.
    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),

    /// Unknown username or wrong password. The two cases are deliberately
    /// indistinguishable.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Token could not be decoded, or its signature does not verify under
    /// the server key.
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token issuer or audience does not match")]
    InvalidIssuerOrAudience,

    #[error("token has expired")]
    Expired,

    #[error("token signing failed")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("password hashing failed")]
    Hashing(#[from] bcrypt::BcryptError),

    /// The persistence collaborator failed; propagated without retry.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl AuthError {
    /// True for the three token validation failures, which share one
    /// unauthorized outcome at the boundary.
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignature | Self::InvalidIssuerOrAudience | Self::Expired
        )
    }

    /// True for failures caused by the backing infrastructure rather than
    /// by the caller's input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Signing(_) | Self::Hashing(_) | Self::Storage(_))
    }
}
