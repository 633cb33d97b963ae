//! In-memory identity provider.
//!
//! Holds users in a map and lets tests script the failure modes the
//! signup tolerance logic has to survive: a confirm rejected because the
//! user is already confirmed, a confirm failing outright, and a login
//! exchange that completes without issuing tokens.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::provider::{AuthTokens, IdentityError, IdentityProvider, UserStatus};

/// How [`MemoryIdentityProvider::admin_confirm`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmBehavior {
    /// Confirm succeeds and marks the user confirmed.
    Succeed,
    /// Confirm is rejected because the user is already confirmed; the
    /// stored status still reads confirmed afterwards.
    RejectAlreadyConfirmed,
    /// Confirm fails for an unrelated reason; the user stays unconfirmed.
    Fail,
}

#[derive(Debug, Clone)]
struct MemoryUser {
    password: String,
    sub: String,
    status: UserStatus,
}

/// In-memory [`IdentityProvider`] implementation.
pub struct MemoryIdentityProvider {
    users: RwLock<HashMap<String, MemoryUser>>,
    confirm_behavior: RwLock<ConfirmBehavior>,
    suppress_tokens: AtomicBool,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            confirm_behavior: RwLock::new(ConfirmBehavior::Succeed),
            suppress_tokens: AtomicBool::new(false),
        }
    }
}

impl MemoryIdentityProvider {
    /// Create an empty provider with the default (succeeding) behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a confirmed user that can log in immediately.
    pub fn add_confirmed_user(&self, username: &str, password: &str) {
        let mut users = self.users.write().expect("rwlock poisoned");
        users.insert(
            username.to_string(),
            MemoryUser {
                password: password.to_string(),
                sub: format!("sub-{username}"),
                status: UserStatus::Confirmed,
            },
        );
    }

    /// Script the confirm step's behavior.
    pub fn set_confirm_behavior(&self, behavior: ConfirmBehavior) {
        *self.confirm_behavior.write().expect("rwlock poisoned") = behavior;
    }

    /// Make the login exchange complete without issuing tokens.
    pub fn set_suppress_tokens(&self, suppress: bool) {
        self.suppress_tokens.store(suppress, Ordering::SeqCst);
    }

    /// Stored confirmation status for a user, if registered.
    pub fn status_of(&self, username: &str) -> Option<UserStatus> {
        let users = self.users.read().expect("rwlock poisoned");
        users.get(username).map(|user| user.status.clone())
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    fn initiate_password_auth(
        &self,
        username: &str,
        password: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<AuthTokens>, IdentityError>> + Send + '_>> {
        let username = username.to_string();
        let password = password.to_string();
        Box::pin(async move {
            let users = self.users.read().expect("rwlock poisoned");
            let user = users
                .get(&username)
                .ok_or(IdentityError::NotAuthorized)?;
            if user.password != password {
                return Err(IdentityError::NotAuthorized);
            }

            if self.suppress_tokens.load(Ordering::SeqCst) {
                return Ok(None);
            }

            Ok(Some(AuthTokens {
                access_token: Some(format!("access-{username}")),
                id_token: Some(format!("id-{username}")),
                refresh_token: Some(format!("refresh-{username}")),
                expires_in: 3600,
            }))
        })
    }

    fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String, IdentityError>> + Send + '_>> {
        let username = username.to_string();
        let password = password.to_string();
        Box::pin(async move {
            let mut users = self.users.write().expect("rwlock poisoned");
            if users.contains_key(&username) {
                return Err(IdentityError::UsernameExists);
            }
            let sub = format!("sub-{username}");
            users.insert(
                username,
                MemoryUser {
                    password,
                    sub: sub.clone(),
                    status: UserStatus::Unconfirmed,
                },
            );
            Ok(sub)
        })
    }

    fn admin_confirm(
        &self,
        username: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), IdentityError>> + Send + '_>> {
        let username = username.to_string();
        Box::pin(async move {
            let behavior = *self.confirm_behavior.read().expect("rwlock poisoned");
            let mut users = self.users.write().expect("rwlock poisoned");
            let user = users.get_mut(&username).ok_or_else(|| {
                IdentityError::Other(anyhow::anyhow!("user {username} does not exist"))
            })?;

            match behavior {
                ConfirmBehavior::Succeed => {
                    user.status = UserStatus::Confirmed;
                    Ok(())
                }
                ConfirmBehavior::RejectAlreadyConfirmed => {
                    user.status = UserStatus::Confirmed;
                    Err(IdentityError::NotAuthorized)
                }
                ConfirmBehavior::Fail => Err(IdentityError::Other(anyhow::anyhow!(
                    "confirmation backend unavailable"
                ))),
            }
        })
    }

    fn user_status(
        &self,
        username: &str,
    ) -> Pin<Box<dyn Future<Output = Result<UserStatus, IdentityError>> + Send + '_>> {
        let username = username.to_string();
        Box::pin(async move {
            let users = self.users.read().expect("rwlock poisoned");
            let user = users.get(&username).ok_or_else(|| {
                IdentityError::Other(anyhow::anyhow!("user {username} does not exist"))
            })?;
            Ok(user.status.clone())
        })
    }
}
