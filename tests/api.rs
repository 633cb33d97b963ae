//! End-to-end tests driving the full router over the in-memory adapters.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use serde_json::{json, Value};
use tower::ServiceExt;

use itemvault::config::Config;
use itemvault::identity::memory::{ConfirmBehavior, MemoryIdentityProvider};
use itemvault::notify::memory::MemoryNotificationBus;
use itemvault::storage::backend::ObjectStorage;
use itemvault::storage::memory::MemoryObjectStorage;
use itemvault::store::item::{ItemRecord, ItemStore};
use itemvault::store::memory::MemoryItemStore;
use itemvault::AppState;

// -- Harness -----------------------------------------------------------------

struct TestApp {
    router: Router,
    store: Arc<MemoryItemStore>,
    storage: Arc<MemoryObjectStorage>,
    notify: Arc<MemoryNotificationBus>,
    identity: Arc<MemoryIdentityProvider>,
}

fn test_config() -> Config {
    serde_yaml::from_str(
        r#"
        store:
          table_name: items
        storage:
          bucket_name: item-images
        notify:
          topic_arn: arn:aws:sns:us-east-1:123456789012:item-events
        identity:
          user_pool_id: us-east-1_AbCdEfGhI
          client_id: abc123
        "#,
    )
    .expect("test config parses")
}

fn test_app() -> TestApp {
    let storage = Arc::new(MemoryObjectStorage::new());
    let mut app = test_app_with_storage(storage.clone());
    app.storage = storage;
    app
}

/// Build a test app with a custom object storage backend.  The returned
/// `storage` handle is a fresh unused in-memory backend; callers that
/// need to inspect stored objects should go through [`test_app`].
fn test_app_with_storage(storage: Arc<dyn ObjectStorage>) -> TestApp {
    let store = Arc::new(MemoryItemStore::new());
    let notify = Arc::new(MemoryNotificationBus::new());
    let identity = Arc::new(MemoryIdentityProvider::new());

    let state = Arc::new(AppState {
        config: test_config(),
        store: store.clone(),
        storage,
        notify: notify.clone(),
        identity: identity.clone(),
        http: reqwest::Client::new(),
    });

    TestApp {
        router: itemvault::server::app(state),
        store,
        storage: Arc::new(MemoryObjectStorage::new()),
        notify,
        identity,
    }
}

/// Object storage that fails every call, for degradation tests.
struct FailingObjectStorage;

impl ObjectStorage for FailingObjectStorage {
    fn put_object(
        &self,
        _key: &str,
        _data: Bytes,
        _content_type: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async { Err(anyhow::anyhow!("object storage unavailable")) })
    }

    fn signed_get_url(
        &self,
        _key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        Box::pin(async { Err(anyhow::anyhow!("signer unavailable")) })
    }
}

fn request(method: &str, uri: &str, authed: bool, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if authed {
        builder = builder.header("authorization", "Bearer test-token");
    }
    match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&value).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn seeded_record(id: &str, title: &str, image_key: Option<&str>) -> ItemRecord {
    ItemRecord {
        id: id.to_string(),
        title: title.to_string(),
        price: serde_json::Number::from(10),
        image_key: image_key.map(|k| k.to_string()),
        created_at: "2020-01-01T00:00:00.000Z".to_string(),
        updated_at: "2020-01-01T00:00:00.000Z".to_string(),
        extra: serde_json::Map::new(),
    }
}

/// Percent-encode the characters a JSON cursor puts in a query value.
fn encode_query_value(raw: &str) -> String {
    let mut encoded = String::new();
    for ch in raw.chars() {
        match ch {
            '{' => encoded.push_str("%7B"),
            '}' => encoded.push_str("%7D"),
            '"' => encoded.push_str("%22"),
            ':' => encoded.push_str("%3A"),
            ',' => encoded.push_str("%2C"),
            other => encoded.push(other),
        }
    }
    encoded
}

/// Serve fixed bytes over a local HTTP listener, returning the URL.
async fn serve_image_bytes(data: &'static [u8]) -> String {
    let app = Router::new().route(
        "/img.jpg",
        axum::routing::get(move || async move {
            ([("content-type", "image/jpeg")], Bytes::from_static(data))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/img.jpg")
}

// -- Auth gate ---------------------------------------------------------------

#[tokio::test]
async fn missing_auth_header_is_rejected_before_any_backend_call() {
    let app = test_app();

    for (method, uri) in [
        ("POST", "/data"),
        ("GET", "/data"),
        ("GET", "/data/abc"),
        ("PUT", "/data/abc"),
        ("DELETE", "/data/abc"),
    ] {
        let body = json!({ "title": "Item 1", "price": 19.99 });
        let (status, response) = send(&app, request(method, uri, false, Some(body))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(response["error"], "Authorization header is required");
    }

    assert!(app.store.is_empty());
    assert!(app.notify.published().is_empty());
}

#[tokio::test]
async fn empty_auth_header_is_rejected() {
    let app = test_app();
    let req = Request::builder()
        .method("GET")
        .uri("/data")
        .header("authorization", "")
        .body(Body::empty())
        .unwrap();
    let (status, response) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error"], "Authorization header is required");
}

// -- Create ------------------------------------------------------------------

#[tokio::test]
async fn create_requires_body() {
    let app = test_app();
    let (status, response) = send(&app, request("POST", "/data", true, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "Request body is required");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn create_requires_title_and_price() {
    let app = test_app();

    for body in [
        json!({ "title": "Item 1" }),
        json!({ "price": 19.99 }),
        json!({ "title": "", "price": 19.99 }),
        json!({ "title": "Item 1", "price": null }),
    ] {
        let (status, response) = send(&app, request("POST", "/data", true, Some(body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], "Title and price are required");
    }

    // Zero is a valid price.
    let body = json!({ "title": "Freebie", "price": 0 });
    let (status, _) = send(&app, request("POST", "/data", true, Some(body))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn create_without_image_stores_row_and_publishes() {
    let app = test_app();
    let body = json!({ "title": "Item 1", "price": 19.99 });
    let (status, response) = send(&app, request("POST", "/data", true, Some(body))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["message"], "Data created successfully");
    assert_eq!(response["imageKey"], Value::Null);

    let id = response["id"].as_str().unwrap().to_string();
    let row = app.store.get(&id).await.unwrap().expect("row stored");
    assert_eq!(row.title, "Item 1");
    assert_eq!(row.price, serde_json::Number::from_f64(19.99).unwrap());
    assert!(row.image_key.is_none());
    assert_eq!(row.created_at, row.updated_at);

    let published = app.notify.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].subject, "Data Created Notification");
    assert_eq!(published[0].message["action"], "data_created");
    assert_eq!(published[0].message["id"], id.as_str());
    assert_eq!(published[0].message["hasImage"], false);
}

#[tokio::test]
async fn create_with_image_uploads_before_store_write() {
    let app = test_app();
    let image_url = serve_image_bytes(b"\xff\xd8fake-jpeg-bytes").await;

    let body = json!({ "title": "Item 1", "price": 19.99, "image": image_url });
    let (status, response) = send(&app, request("POST", "/data", true, Some(body))).await;

    assert_eq!(status, StatusCode::CREATED);
    let id = response["id"].as_str().unwrap();
    let expected_key = format!("{id}/{id}.jpg");
    assert_eq!(response["imageKey"], expected_key.as_str());

    assert!(app.storage.contains(&expected_key));
    let row = app.store.get(id).await.unwrap().unwrap();
    assert_eq!(row.image_key.as_deref(), Some(expected_key.as_str()));

    let published = app.notify.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].message["hasImage"], true);
}

#[tokio::test]
async fn create_image_upload_failure_aborts_store_write() {
    let app = test_app_with_storage(Arc::new(FailingObjectStorage));
    let image_url = serve_image_bytes(b"\xff\xd8fake-jpeg-bytes").await;

    let body = json!({ "title": "Item 1", "price": 19.99, "image": image_url });
    let (status, _) = send(&app, request("POST", "/data", true, Some(body))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.store.is_empty());
    assert!(app.notify.published().is_empty());
}

#[tokio::test]
async fn malformed_json_body_is_a_client_error() {
    let app = test_app();
    let req = Request::builder()
        .method("POST")
        .uri("/data")
        .header("authorization", "Bearer t")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, response) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "Request body must be valid JSON");
}

// -- List / Get --------------------------------------------------------------

#[tokio::test]
async fn list_preserves_scan_order_and_augments_image_urls() {
    let app = test_app();
    app.store
        .put(seeded_record("a", "First", None))
        .await
        .unwrap();
    app.store
        .put(seeded_record("b", "Second", Some("b/b.jpg")))
        .await
        .unwrap();

    let (status, response) = send(&app, request("GET", "/data", true, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], "Items retrieved successfully");
    assert_eq!(response["count"], 2);
    assert_eq!(response["lastEvaluatedKey"], Value::Null);

    let items = response["items"].as_array().unwrap();
    assert_eq!(items[0]["id"], "a");
    assert_eq!(items[0]["imageUrl"], Value::Null);
    assert_eq!(items[1]["id"], "b");
    let url = items[1]["imageUrl"].as_str().expect("signed url");
    assert!(url.contains("b/b.jpg"));
}

#[tokio::test]
async fn list_pagination_cursor_round_trips() {
    let app = test_app();
    for id in ["a", "b", "c"] {
        app.store.put(seeded_record(id, id, None)).await.unwrap();
    }

    let (status, first) = send(&app, request("GET", "/data?limit=2", true, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["count"], 2);
    let cursor = first["lastEvaluatedKey"].as_str().expect("cursor").to_string();

    let uri = format!("/data?limit=2&lastEvaluatedKey={}", encode_query_value(&cursor));
    let (status, second) = send(&app, request("GET", &uri, true, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["count"], 1);
    assert_eq!(second["items"][0]["id"], "c");
    assert_eq!(second["lastEvaluatedKey"], Value::Null);
}

#[tokio::test]
async fn get_returns_single_item_with_image_url() {
    let app = test_app();
    app.store
        .put(seeded_record("a", "First", Some("a/a.jpg")))
        .await
        .unwrap();

    let (status, response) = send(&app, request("GET", "/data/a", true, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], "Item retrieved successfully");
    assert_eq!(response["item"]["id"], "a");
    assert!(response["item"]["imageUrl"].as_str().is_some());
}

#[tokio::test]
async fn get_missing_item_is_404() {
    let app = test_app();
    let (status, response) = send(&app, request("GET", "/data/ghost", true, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"], "Item not found");
}

#[tokio::test]
async fn signing_failure_degrades_image_url_to_null() {
    let app = test_app_with_storage(Arc::new(FailingObjectStorage));
    app.store
        .put(seeded_record("a", "First", Some("a/a.jpg")))
        .await
        .unwrap();

    let (status, response) = send(&app, request("GET", "/data/a", true, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["item"]["imageUrl"], Value::Null);
}

// -- Update ------------------------------------------------------------------

#[tokio::test]
async fn update_merges_fields_and_bumps_updated_at() {
    let app = test_app();
    app.store
        .put(seeded_record("a", "First", None))
        .await
        .unwrap();

    let body = json!({ "title": "X" });
    let (status, response) = send(&app, request("PUT", "/data/a", true, Some(body))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], "Item updated successfully");

    let item = &response["item"];
    assert_eq!(item["id"], "a");
    assert_eq!(item["title"], "X");
    assert_eq!(item["createdAt"], "2020-01-01T00:00:00.000Z");
    assert_ne!(item["updatedAt"], "2020-01-01T00:00:00.000Z");

    let published = app.notify.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].subject, "Item Updated Notification");
    assert_eq!(published[0].message["action"], "item_updated");
    assert_eq!(published[0].message["updatedFields"], json!(["title"]));
}

#[tokio::test]
async fn update_ignores_protected_fields() {
    let app = test_app();
    app.store
        .put(seeded_record("a", "First", None))
        .await
        .unwrap();

    let body = json!({ "id": "evil", "createdAt": "1999-01-01T00:00:00.000Z", "title": "X" });
    let (status, response) = send(&app, request("PUT", "/data/a", true, Some(body))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["item"]["id"], "a");
    assert_eq!(response["item"]["createdAt"], "2020-01-01T00:00:00.000Z");
    assert_eq!(response["item"]["title"], "X");
    assert!(app.store.get("evil").await.unwrap().is_none());
}

#[tokio::test]
async fn update_missing_item_is_404_and_writes_nothing() {
    let app = test_app();
    let body = json!({ "title": "X" });
    let (status, response) = send(&app, request("PUT", "/data/ghost", true, Some(body))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"], "Item not found");
    assert!(app.notify.published().is_empty());
}

#[tokio::test]
async fn update_requires_body() {
    let app = test_app();
    app.store
        .put(seeded_record("a", "First", None))
        .await
        .unwrap();

    let (status, response) = send(&app, request("PUT", "/data/a", true, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "Request body is required");
}

#[tokio::test]
async fn update_and_delete_without_id_are_client_errors() {
    let app = test_app();
    for method in ["PUT", "DELETE"] {
        let (status, response) =
            send(&app, request(method, "/data", true, Some(json!({})))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method}");
        assert_eq!(response["error"], "Item ID is required in path parameter");
    }
}

// -- Delete ------------------------------------------------------------------

#[tokio::test]
async fn delete_publishes_snapshot_and_repeat_is_404() {
    let app = test_app();
    app.store
        .put(seeded_record("a", "First", None))
        .await
        .unwrap();

    let (status, response) = send(&app, request("DELETE", "/data/a", true, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], "Item deleted successfully");
    assert_eq!(response["deletedId"], "a");
    assert!(app.store.get("a").await.unwrap().is_none());

    let published = app.notify.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].subject, "Item Deleted Notification");
    assert_eq!(published[0].message["action"], "item_deleted");
    assert_eq!(published[0].message["deletedItem"]["title"], "First");

    // Repeating the delete must 404, not report a second success.
    let (status, response) = send(&app, request("DELETE", "/data/a", true, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"], "Item not found");
    assert_eq!(app.notify.published().len(), 1);
}

// -- Login -------------------------------------------------------------------

#[tokio::test]
async fn login_returns_provider_tokens() {
    let app = test_app();
    app.identity.add_confirmed_user("a@example.com", "pw");

    let body = json!({ "email": "a@example.com", "password": "pw" });
    let (status, response) = send(&app, request("POST", "/login", false, Some(body))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["accessToken"], "access-a@example.com");
    assert_eq!(response["idToken"], "id-a@example.com");
    assert_eq!(response["refreshToken"], "refresh-a@example.com");
    assert_eq!(response["expiresIn"], 3600);
}

#[tokio::test]
async fn login_with_wrong_password_is_invalid_credentials() {
    let app = test_app();
    app.identity.add_confirmed_user("a@example.com", "pw");

    let body = json!({ "email": "a@example.com", "password": "wrong" });
    let (status, response) = send(&app, request("POST", "/login", false, Some(body))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error"], "Invalid credentials");
}

#[tokio::test]
async fn login_without_tokens_is_authentication_failed() {
    let app = test_app();
    app.identity.add_confirmed_user("a@example.com", "pw");
    app.identity.set_suppress_tokens(true);

    let body = json!({ "email": "a@example.com", "password": "pw" });
    let (status, response) = send(&app, request("POST", "/login", false, Some(body))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error"], "Authentication failed");
}

#[tokio::test]
async fn login_requires_body_and_fields() {
    let app = test_app();

    let (status, response) = send(&app, request("POST", "/login", false, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "Request body is required");

    let body = json!({ "email": "a@example.com" });
    let (status, response) = send(&app, request("POST", "/login", false, Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "Email and password are required");
}

// -- Signup ------------------------------------------------------------------

#[tokio::test]
async fn signup_registers_and_auto_confirms() {
    let app = test_app();

    let body = json!({ "email": "new@example.com", "password": "pw" });
    let (status, response) = send(&app, request("POST", "/signup", false, Some(body))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["message"], "User created and confirmed successfully");
    assert_eq!(response["userSub"], "sub-new@example.com");
    assert_eq!(response["confirmed"], true);
    assert_eq!(response["userStatus"], "CONFIRMED");
}

#[tokio::test]
async fn signup_tolerates_already_confirmed_rejection() {
    let app = test_app();
    app.identity
        .set_confirm_behavior(ConfirmBehavior::RejectAlreadyConfirmed);

    let body = json!({ "email": "new@example.com", "password": "pw" });
    let (status, response) = send(&app, request("POST", "/signup", false, Some(body))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["confirmed"], true);
    assert_eq!(response["userStatus"], "CONFIRMED");
}

#[tokio::test]
async fn signup_still_succeeds_when_confirm_fails() {
    let app = test_app();
    app.identity.set_confirm_behavior(ConfirmBehavior::Fail);

    let body = json!({ "email": "new@example.com", "password": "pw" });
    let (status, response) = send(&app, request("POST", "/signup", false, Some(body))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["message"], "User created successfully");
    assert_eq!(response["confirmed"], false);
    assert!(response["warning"].as_str().is_some());
}

#[tokio::test]
async fn signup_with_existing_username_is_409() {
    let app = test_app();
    app.identity.add_confirmed_user("taken@example.com", "pw");

    let body = json!({ "email": "taken@example.com", "password": "pw" });
    let (status, response) = send(&app, request("POST", "/signup", false, Some(body))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(response["error"], "User already exists");
}

// -- Response envelope -------------------------------------------------------

#[tokio::test]
async fn responses_carry_cors_and_request_id_headers() {
    let app = test_app();

    // Success path.
    let response = app
        .router
        .clone()
        .oneshot(request("GET", "/health", false, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    let request_id = response.headers().get("x-request-id").unwrap();
    assert_eq!(request_id.to_str().unwrap().len(), 16);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/json"));

    // Error responses carry the same envelope.
    let response = app
        .router
        .clone()
        .oneshot(request("GET", "/data", false, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    assert!(response.headers().get("x-request-id").is_some());
}
