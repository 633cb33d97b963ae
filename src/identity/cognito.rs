//! AWS Cognito identity provider backend.
//!
//! Wraps the four calls the handlers need: `InitiateAuth` with the
//! USER_PASSWORD_AUTH flow, `SignUp`, `AdminConfirmSignUp`, and
//! `AdminGetUser`.  SDK service errors are folded into the closed
//! [`IdentityError`] enum at this boundary so the handlers never see
//! provider-specific error types.

use std::future::Future;
use std::pin::Pin;

use aws_sdk_cognitoidentityprovider::operation::admin_confirm_sign_up::AdminConfirmSignUpError;
use aws_sdk_cognitoidentityprovider::operation::initiate_auth::InitiateAuthError;
use aws_sdk_cognitoidentityprovider::operation::sign_up::SignUpError;
use aws_sdk_cognitoidentityprovider::types::{AttributeType, AuthFlowType, UserStatusType};
use aws_sdk_cognitoidentityprovider::Client;
use tracing::debug;

use super::provider::{AuthTokens, IdentityError, IdentityProvider, UserStatus};

/// Cognito-backed [`IdentityProvider`].
pub struct CognitoIdentityProvider {
    client: Client,
    user_pool_id: String,
    client_id: String,
}

impl CognitoIdentityProvider {
    /// Create a provider over an already-configured SDK client.
    pub fn new(
        client: Client,
        user_pool_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            user_pool_id: user_pool_id.into(),
            client_id: client_id.into(),
        }
    }
}

impl IdentityProvider for CognitoIdentityProvider {
    fn initiate_password_auth(
        &self,
        username: &str,
        password: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<AuthTokens>, IdentityError>> + Send + '_>> {
        let username = username.to_string();
        let password = password.to_string();
        Box::pin(async move {
            debug!("Cognito initiate_auth: username={}", username);
            let response = self
                .client
                .initiate_auth()
                .client_id(&self.client_id)
                .auth_flow(AuthFlowType::UserPasswordAuth)
                .auth_parameters("USERNAME", username)
                .auth_parameters("PASSWORD", password)
                .send()
                .await
                .map_err(|e| match e.into_service_error() {
                    InitiateAuthError::NotAuthorizedException(_) => IdentityError::NotAuthorized,
                    other => IdentityError::Other(anyhow::anyhow!(
                        "Cognito initiate_auth: {other}"
                    )),
                })?;

            Ok(response.authentication_result().map(|result| AuthTokens {
                access_token: result.access_token().map(|t| t.to_string()),
                id_token: result.id_token().map(|t| t.to_string()),
                refresh_token: result.refresh_token().map(|t| t.to_string()),
                expires_in: result.expires_in(),
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
            debug!("Cognito sign_up: username={}", username);
            let email_attribute = AttributeType::builder()
                .name("email")
                .value(&username)
                .build()
                .map_err(|e| {
                    IdentityError::Other(anyhow::anyhow!("Cognito attribute build: {e}"))
                })?;

            let response = self
                .client
                .sign_up()
                .client_id(&self.client_id)
                .username(&username)
                .password(&password)
                .user_attributes(email_attribute)
                .send()
                .await
                .map_err(|e| match e.into_service_error() {
                    SignUpError::UsernameExistsException(_) => IdentityError::UsernameExists,
                    other => IdentityError::Other(anyhow::anyhow!("Cognito sign_up: {other}")),
                })?;

            Ok(response.user_sub().to_string())
        })
    }

    fn admin_confirm(
        &self,
        username: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), IdentityError>> + Send + '_>> {
        let username = username.to_string();
        Box::pin(async move {
            debug!("Cognito admin_confirm_sign_up: username={}", username);
            self.client
                .admin_confirm_sign_up()
                .user_pool_id(&self.user_pool_id)
                .username(&username)
                .send()
                .await
                .map_err(|e| match e.into_service_error() {
                    AdminConfirmSignUpError::NotAuthorizedException(_) => {
                        IdentityError::NotAuthorized
                    }
                    other if other.meta().code() == Some("AliasExistsException") => {
                        IdentityError::AliasExists
                    }
                    other => IdentityError::Other(anyhow::anyhow!(
                        "Cognito admin_confirm_sign_up: {other}"
                    )),
                })?;
            Ok(())
        })
    }

    fn user_status(
        &self,
        username: &str,
    ) -> Pin<Box<dyn Future<Output = Result<UserStatus, IdentityError>> + Send + '_>> {
        let username = username.to_string();
        Box::pin(async move {
            debug!("Cognito admin_get_user: username={}", username);
            let response = self
                .client
                .admin_get_user()
                .user_pool_id(&self.user_pool_id)
                .username(&username)
                .send()
                .await
                .map_err(|e| {
                    IdentityError::Other(anyhow::anyhow!(
                        "Cognito admin_get_user: {}",
                        e.into_service_error()
                    ))
                })?;

            Ok(match response.user_status() {
                Some(UserStatusType::Confirmed) => UserStatus::Confirmed,
                Some(UserStatusType::Unconfirmed) => UserStatus::Unconfirmed,
                Some(other) => UserStatus::Other(other.as_str().to_string()),
                None => UserStatus::Other("UNKNOWN".to_string()),
            })
        })
    }
}
