//! Identity port: Trait for verifying caller credentials.
//!
//! The identity provider protocol lives outside this crate; the serving
//! boundary only needs a function from bearer token to verified identity.

/// Errors that can occur while verifying a caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Token rejected: {0}")]
    Rejected(String),

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

/// A caller whose token was accepted by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Provider-assigned subject identifier
    pub subject: String,
}

/// Trait for bearer token verification.
pub trait IdentityVerifier: Send + Sync {
    /// Verify a bearer token.
    ///
    /// # Errors
    /// Returns `AuthError::Rejected` for invalid or expired tokens and
    /// `AuthError::Unavailable` when the provider cannot be reached.
    fn verify(&self, bearer_token: &str) -> Result<VerifiedIdentity, AuthError>;
}
