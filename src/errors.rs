//! API error types.
//!
//! Every variant maps to a fixed HTTP status and a JSON body of the form
//! `{"error": <message>}`.  The enum implements
//! [`axum::response::IntoResponse`] so handlers can simply return
//! `Err(ApiError::ItemNotFound)`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Request-handling errors expressed as a Rust enum.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The Authorization header is absent.
    #[error("Authorization header is required")]
    MissingAuthorization,

    /// The request body is absent.
    #[error("Request body is required")]
    MissingBody,

    /// A path parameter or request field is missing or malformed.
    #[error("{message}")]
    InvalidRequest { message: String },

    /// The requested item does not exist.
    #[error("Item not found")]
    ItemNotFound,

    /// The identity provider rejected the supplied credentials.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The identity provider completed the exchange without issuing tokens.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Registration failed because the username is taken.
    #[error("User already exists")]
    UserAlreadyExists,

    /// Catch-all for unexpected internal errors.
    #[error("{}", internal_message(.0))]
    Internal(#[from] anyhow::Error),
}

/// Render an internal error's message, falling back to a generic string
/// when the underlying error has none.
fn internal_message(err: &anyhow::Error) -> String {
    let message = err.to_string();
    if message.is_empty() {
        "Internal server error".to_string()
    } else {
        message
    }
}

impl ApiError {
    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingAuthorization => StatusCode::UNAUTHORIZED,
            ApiError::MissingBody => StatusCode::BAD_REQUEST,
            ApiError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::ItemNotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            ApiError::UserAlreadyExists => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {:#}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ApiError::MissingAuthorization.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::MissingBody.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::ItemNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::UserAlreadyExists.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_error_without_message_uses_generic_text() {
        let err = ApiError::Internal(anyhow::anyhow!(""));
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn request_id_is_sixteen_hex_chars() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
