//! Item CRUD handlers.
//!
//! Each handler validates in a fixed order (path parameter, body, body
//! fields), performs its backend calls sequentially, and publishes a
//! mutation event only after the primary write has committed.  The auth
//! gate runs as router middleware before any of these are reached.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::notify::bus::MutationEvent;
use crate::store::item::{ItemPatch, ItemRecord};
use crate::AppState;

/// Current time as an ISO-8601 UTC string with millisecond precision.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a request body as a JSON object, distinguishing "no body" from
/// "malformed body".
fn parse_json_object(
    body: &Bytes,
) -> Result<serde_json::Map<String, serde_json::Value>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::MissingBody);
    }
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| ApiError::InvalidRequest {
            message: "Request body must be valid JSON".to_string(),
        })?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(ApiError::InvalidRequest {
            message: "Request body must be a JSON object".to_string(),
        }),
    }
}

/// Serialize an item and attach the computed `imageUrl` field.
///
/// `imageUrl` is null when the item has no image key; a signing failure
/// degrades to null as well rather than failing the whole request.
async fn with_image_url(state: &AppState, record: &ItemRecord) -> serde_json::Value {
    let image_url = match &record.image_key {
        None => serde_json::Value::Null,
        Some(key) => match state.storage.signed_get_url(key).await {
            Ok(url) => serde_json::Value::String(url),
            Err(err) => {
                warn!("Failed to generate URL for imageKey {}: {:#}", key, err);
                serde_json::Value::Null
            }
        },
    };

    let mut doc = serde_json::to_value(record).unwrap_or_default();
    if let Some(map) = doc.as_object_mut() {
        map.insert("imageUrl".to_string(), image_url);
    }
    doc
}

// -- Create ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateItemRequest {
    title: Option<String>,
    price: Option<serde_json::Number>,
    image: Option<String>,
}

/// `POST /data` -- create an item.
///
/// When an image URL is supplied the bytes are fetched and uploaded
/// before the store write, so a committed row never references a
/// missing object.  An upload orphaned by a later store failure is not
/// cleaned up.
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body = parse_json_object(&body)?;
    let request: CreateItemRequest =
        serde_json::from_value(serde_json::Value::Object(body)).map_err(|_| {
            ApiError::InvalidRequest {
                message: "Title and price are required".to_string(),
            }
        })?;

    let title = match request.title {
        Some(title) if !title.is_empty() => title,
        _ => {
            return Err(ApiError::InvalidRequest {
                message: "Title and price are required".to_string(),
            })
        }
    };
    // Zero is a valid price; only a missing or null price is rejected.
    let price = request.price.ok_or_else(|| ApiError::InvalidRequest {
        message: "Title and price are required".to_string(),
    })?;

    let id = Uuid::new_v4().to_string();
    let timestamp = now_timestamp();

    let image_key = match request.image {
        Some(image_url) if !image_url.is_empty() => {
            let key = format!("{id}/{id}.jpg");
            let data = fetch_image(&state, &image_url).await?;
            state
                .storage
                .put_object(&key, data, "image/jpeg")
                .await?;
            Some(key)
        }
        _ => None,
    };

    let record = ItemRecord {
        id: id.clone(),
        title,
        price,
        image_key: image_key.clone(),
        created_at: timestamp.clone(),
        updated_at: timestamp.clone(),
        extra: serde_json::Map::new(),
    };

    state.store.put(record).await?;

    state
        .notify
        .publish(&MutationEvent::DataCreated {
            id: id.clone(),
            timestamp,
            has_image: image_key.is_some(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Data created successfully",
            "id": id,
            "imageKey": image_key,
        })),
    )
        .into_response())
}

/// Download image bytes within the configured timeout and size cap.
///
/// The per-request timeout lives on the shared `reqwest` client; only
/// the size bound is enforced here.
async fn fetch_image(state: &AppState, url: &str) -> Result<Bytes, ApiError> {
    let max_bytes = state.config.fetch.max_bytes;

    let response = state
        .http
        .get(url)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Image download failed: {e}"))?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Image download failed: {e}"))?;

    if let Some(length) = response.content_length() {
        if length > max_bytes {
            return Err(ApiError::InvalidRequest {
                message: format!("Image exceeds the maximum size of {max_bytes} bytes"),
            });
        }
    }

    let data = response
        .bytes()
        .await
        .map_err(|e| anyhow::anyhow!("Image download failed: {e}"))?;

    if data.len() as u64 > max_bytes {
        return Err(ApiError::InvalidRequest {
            message: format!("Image exceeds the maximum size of {max_bytes} bytes"),
        });
    }

    Ok(data)
}

// -- List / Get --------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    limit: Option<String>,
    #[serde(rename = "lastEvaluatedKey")]
    last_evaluated_key: Option<String>,
}

/// `GET /data` -- scan all items with optional pagination.
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let limit = match query.limit {
        Some(raw) => Some(raw.parse::<u32>().map_err(|_| ApiError::InvalidRequest {
            message: "limit must be a positive integer".to_string(),
        })?),
        None => None,
    };

    let page = state
        .store
        .scan(limit, query.last_evaluated_key.as_deref())
        .await?;

    // Output order follows scan order regardless of signing order.
    let mut items = Vec::with_capacity(page.items.len());
    for record in &page.items {
        items.push(with_image_url(&state, record).await);
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Items retrieved successfully",
            "items": items,
            "count": items.len(),
            "lastEvaluatedKey": page.last_evaluated_key,
        })),
    )
        .into_response())
}

/// `GET /data/:id` -- point lookup.
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let record = state.store.get(&id).await?.ok_or(ApiError::ItemNotFound)?;
    let item = with_image_url(&state, &record).await;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Item retrieved successfully",
            "item": item,
        })),
    )
        .into_response())
}

// -- Update ------------------------------------------------------------------

/// `PUT /data/:id` -- partial update.
///
/// Protected fields (`id`, `createdAt`, `updatedAt`) are dropped from
/// the patch; `updatedAt` is bumped unconditionally.  The response
/// carries the re-read row, not the update call's own output.
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body = parse_json_object(&body)?;

    if state.store.get(&id).await?.is_none() {
        return Err(ApiError::ItemNotFound);
    }

    let timestamp = now_timestamp();
    let patch = ItemPatch::from_body(&body);
    state.store.update(&id, &patch, &timestamp).await?;

    let updated = state
        .store
        .get(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("item {id} disappeared during update"))?;

    // Field names as submitted, before protected-field filtering.
    let updated_fields: Vec<String> = body.keys().cloned().collect();
    state
        .notify
        .publish(&MutationEvent::ItemUpdated {
            id: id.clone(),
            timestamp,
            updated_fields,
        })
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Item updated successfully",
            "item": serde_json::to_value(&updated).map_err(anyhow::Error::from)?,
        })),
    )
        .into_response())
}

// -- Delete ------------------------------------------------------------------

/// `DELETE /data/:id` -- hard delete.
///
/// The existence check makes repeated deletes of the same id fail with
/// 404 rather than reporting a second success.
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let snapshot = state.store.get(&id).await?.ok_or(ApiError::ItemNotFound)?;

    state.store.delete(&id).await?;

    let timestamp = now_timestamp();
    state
        .notify
        .publish(&MutationEvent::ItemDeleted {
            id: id.clone(),
            timestamp,
            deleted_item: serde_json::to_value(&snapshot).map_err(anyhow::Error::from)?,
        })
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Item deleted successfully",
            "deletedId": id,
        })),
    )
        .into_response())
}

/// `PUT /data` / `DELETE /data` -- the id segment is missing.
pub async fn missing_item_id() -> Result<Response, ApiError> {
    Err(ApiError::InvalidRequest {
        message: "Item ID is required in path parameter".to_string(),
    })
}
