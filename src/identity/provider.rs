//! Abstract identity provider trait.
//!
//! Covers the two auth flows this service orchestrates: a password login
//! exchange and a registration + administrative auto-confirmation
//! exchange.  Provider rejections the handlers care about are a closed
//! enum, dispatched with exhaustive matching rather than by inspecting
//! error-name strings.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Provider failures with a handler-visible meaning, plus a catch-all.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider rejected the supplied credentials, or refused an
    /// administrative confirm (which it does for already-confirmed users).
    #[error("not authorized")]
    NotAuthorized,

    /// Registration failed because the username is taken.
    #[error("username already exists")]
    UsernameExists,

    /// A confirm failed because an alias for the user already exists.
    #[error("alias already exists")]
    AliasExists,

    /// Anything else: network failure, malformed response, throttling.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Tokens issued by a successful password exchange.  Passed straight
/// through to the caller; nothing is persisted.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: i32,
}

/// Confirmation state of a registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserStatus {
    Confirmed,
    Unconfirmed,
    /// Any other provider-reported status, carried verbatim.
    Other(String),
}

impl UserStatus {
    /// The provider's wire spelling of this status.
    pub fn as_str(&self) -> &str {
        match self {
            UserStatus::Confirmed => "CONFIRMED",
            UserStatus::Unconfirmed => "UNCONFIRMED",
            UserStatus::Other(status) => status,
        }
    }
}

/// Async identity provider contract.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Run a password auth exchange.  `Ok(None)` means the provider
    /// completed the call without issuing tokens (e.g. a challenge the
    /// service does not handle).
    fn initiate_password_auth(
        &self,
        username: &str,
        password: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<AuthTokens>, IdentityError>> + Send + '_>>;

    /// Register a new user, returning the provider-assigned user id.
    fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String, IdentityError>> + Send + '_>>;

    /// Administratively mark a registered user as confirmed.
    fn admin_confirm(
        &self,
        username: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), IdentityError>> + Send + '_>>;

    /// Administratively fetch a user's confirmation status.
    fn user_status(
        &self,
        username: &str,
    ) -> Pin<Box<dyn Future<Output = Result<UserStatus, IdentityError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_spelling() {
        assert_eq!(UserStatus::Confirmed.as_str(), "CONFIRMED");
        assert_eq!(UserStatus::Unconfirmed.as_str(), "UNCONFIRMED");
        assert_eq!(
            UserStatus::Other("RESET_REQUIRED".to_string()).as_str(),
            "RESET_REQUIRED"
        );
    }
}
