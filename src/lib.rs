//! itemvault library — CRUD item API over managed AWS backends.
//!
//! This crate provides the components for running a small item API:
//! request handlers, a DynamoDB-backed item store, S3-backed image
//! storage with presigned read URLs, SNS mutation notifications, and
//! Cognito login/signup orchestration.  Every adapter seam has an
//! in-memory implementation for tests and local development.

use std::sync::Arc;

pub mod config;
pub mod errors;
pub mod handlers;
pub mod identity;
pub mod notify;
pub mod server;
pub mod storage;
pub mod store;

use crate::config::Config;
use crate::identity::provider::IdentityProvider;
use crate::notify::bus::NotificationBus;
use crate::storage::backend::ObjectStorage;
use crate::store::item::ItemStore;

/// Shared application state passed to all handlers via
/// `axum::extract::State`.
///
/// Adapters are constructed once at startup and injected here; handlers
/// hold no clients of their own.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Item store (DynamoDB or in-memory).
    pub store: Arc<dyn ItemStore>,
    /// Object storage for item images (S3 or in-memory).
    pub storage: Arc<dyn ObjectStorage>,
    /// Mutation notification bus (SNS or in-memory).
    pub notify: Arc<dyn NotificationBus>,
    /// Identity provider (Cognito or in-memory).
    pub identity: Arc<dyn IdentityProvider>,
    /// HTTP client for the create path's image download.
    pub http: reqwest::Client,
}
