//! Axum router construction and middleware.
//!
//! The [`app`] function wires every endpoint to its handler and returns
//! a ready-to-serve [`axum::Router`].  The `/data` routes sit behind an
//! auth gate that only checks for a bearer credential's presence --
//! cryptographic validation is the platform's concern, exercised at
//! login time by the identity provider.

use std::sync::Arc;

use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::errors::{generate_request_id, ApiError};
use crate::handlers::{auth, items};
use crate::AppState;

/// Build the axum [`Router`] with all routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    // Item routes require the auth gate; login/signup/health do not.
    let protected = Router::new()
        .route(
            "/data",
            post(items::create_item)
                .get(items::list_items)
                .put(items::missing_item_id)
                .delete(items::missing_item_id),
        )
        .route(
            "/data/:id",
            get(items::get_item)
                .put(items::update_item)
                .delete(items::delete_item),
        )
        .route_layer(middleware::from_fn(auth_gate));

    let public = Router::new()
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))
        .route("/health", get(health_check));

    Router::new()
        .merge(protected)
        .merge(public)
        .with_state(state)
        // Layer ordering: the last layer added is outermost.  The cors
        // layer handles preflight; common_headers backstops the CORS
        // header on plain responses and stamps the request id.
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(common_headers_middleware))
        .layer(TraceLayer::new_for_http())
}

// -- Auth gate ---------------------------------------------------------------

/// Reject requests without a non-empty Authorization header.
///
/// Runs before the item handlers, so a missing header short-circuits
/// with 401 before any backend call is attempted.
async fn auth_gate(req: Request<axum::body::Body>, next: Next) -> Result<Response, ApiError> {
    let present = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.is_empty());

    if !present {
        return Err(ApiError::MissingAuthorization);
    }

    Ok(next.run(req).await)
}

// -- Common headers middleware -----------------------------------------------

/// Add common response headers to every response:
/// - `x-request-id`: 16-character uppercase hex string
/// - `Access-Control-Allow-Origin: *`
/// - `Server: itemvault`
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-request-id") {
        let request_id = generate_request_id();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", value);
        }
    }

    if !headers.contains_key("access-control-allow-origin") {
        headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    }

    headers.insert("server", HeaderValue::from_static("itemvault"));

    response
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
