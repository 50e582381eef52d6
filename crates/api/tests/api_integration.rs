//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::UserId;
use metrics_exporter_prometheus::PrometheusHandle;
use store::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> Router {
    setup_with_store().0
}

fn setup_with_store() -> (Router, InMemoryStore) {
    let store = InMemoryStore::new();
    let state = api::create_default_state(store.clone());
    let app = api::create_app(state, get_metrics_handle());
    (app, store)
}

fn request(method: &str, uri: &str, user: Option<UserId>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

async fn create_product(app: &Router, name: &str, price_cents: i64, stock: u32) -> String {
    let (status, json) = send(
        app,
        request(
            "POST",
            "/products",
            Some(UserId::new()),
            Some(serde_json::json!({
                "name": name,
                "price_cents": price_cents,
                "stock": stock
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_string()
}

async fn add_to_cart(app: &Router, user: UserId, product_id: &str, quantity: u32) -> (StatusCode, serde_json::Value) {
    send(
        app,
        request(
            "POST",
            "/carts",
            Some(user),
            Some(serde_json::json!({ "product_id": product_id, "quantity": quantity })),
        ),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = send(&app, request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "api");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let user = UserId::new();
    let product = create_product(&app, "Widget", 1000, 10).await;
    add_to_cart(&app, user, &product, 1).await;

    let response = app
        .oneshot(request("GET", "/metrics", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("cart_items_added_total"));
}

#[tokio::test]
async fn test_missing_or_invalid_user_is_unauthorized() {
    let app = setup();

    let (status, json) = send(&app, request("GET", "/carts", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].as_str().unwrap().contains("x-user-id"));

    let bad = Request::builder()
        .uri("/carts")
        .header("x-user-id", "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, bad).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_and_get_product() {
    let app = setup();
    let id = create_product(&app, "Keyboard", 4999, 3).await;

    let (status, json) = send(&app, request("GET", &format!("/products/{id}"), None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Keyboard");
    assert_eq!(json["price_cents"], 4999);
    assert_eq!(json["stock"], 3);

    let (status, _) = send(
        &app,
        request("GET", &format!("/products/{}", UserId::new()), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, request("GET", "/products/nope", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_product_is_rejected() {
    let app = setup();
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/products",
            Some(UserId::new()),
            Some(serde_json::json!({ "name": "Widget", "price_cents": -5, "stock": 1 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_to_cart_merges() {
    let app = setup();
    let user = UserId::new();
    let product = create_product(&app, "Widget", 1000, 10).await;

    let (status, json) = add_to_cart(&app, user, &product, 2).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["quantity"], 2);
    assert_eq!(json["cost_cents"], 2000);

    let (status, json) = add_to_cart(&app, user, &product, 3).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["quantity"], 5);

    let (status, json) = send(&app, request("GET", "/carts", Some(user), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"].as_array().unwrap().len(), 1);
    assert_eq!(json["total_cost_cents"], 5000);
    assert_eq!(json["items"][0]["stock"], 10);
}

#[tokio::test]
async fn test_add_to_cart_rejections() {
    let app = setup();
    let user = UserId::new();
    let product = create_product(&app, "Widget", 1000, 2).await;

    let (status, _) = add_to_cart(&app, user, &product, 3).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = add_to_cart(&app, user, &product, 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = add_to_cart(&app, user, &UserId::new().to_string(), 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, request("GET", "/carts", Some(user), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_flow() {
    let app = setup();
    let user = UserId::new();
    let product_a = create_product(&app, "Widget", 1000, 10).await;
    let product_b = create_product(&app, "Gadget", 500, 10).await;
    add_to_cart(&app, user, &product_a, 2).await;
    add_to_cart(&app, user, &product_b, 1).await;

    let (status, order) = send(&app, request("POST", "/orders/checkout", Some(user), None)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_cost_cents"], 2500);
    assert_eq!(order["items"].as_array().unwrap().len(), 2);

    let (_, cart) = send(&app, request("GET", "/carts", Some(user), None)).await;
    assert!(cart["items"].as_array().unwrap().is_empty());

    let order_id = order["id"].as_str().unwrap();
    let (status, fetched) = send(
        &app,
        request("GET", &format!("/orders/{order_id}"), Some(user), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], order["id"]);

    let (status, listed) = send(&app, request("GET", "/orders", Some(user), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Other users cannot see the order
    let (status, _) = send(
        &app,
        request("GET", &format!("/orders/{order_id}"), Some(UserId::new()), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_empty_cart() {
    let app = setup();
    let (status, json) = send(
        &app,
        request("POST", "/orders/checkout", Some(UserId::new()), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("cart is empty"));
}

#[tokio::test]
async fn test_checkout_insufficient_stock_names_product() {
    let (app, store) = setup_with_store();
    let user = UserId::new();
    let product = create_product(&app, "Widget", 1000, 5).await;
    add_to_cart(&app, user, &product, 4).await;
    store
        .set_stock(product.parse().unwrap(), 1)
        .await
        .unwrap();

    let (status, json) = send(&app, request("POST", "/orders/checkout", Some(user), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains(&product));
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn test_internal_errors_are_opaque() {
    let (app, store) = setup_with_store();
    let user = UserId::new();
    let product = create_product(&app, "Widget", 1000, 5).await;
    add_to_cart(&app, user, &product, 1).await;
    store.set_fail_on_transfer(true).await;

    let (status, json) = send(&app, request("POST", "/orders/checkout", Some(user), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "internal server error");
}

#[tokio::test]
async fn test_order_status_updates() {
    let app = setup();
    let user = UserId::new();
    let product = create_product(&app, "Widget", 1000, 5).await;
    add_to_cart(&app, user, &product, 1).await;
    let (_, order) = send(&app, request("POST", "/orders/checkout", Some(user), None)).await;
    let uri = format!("/orders/{}/status", order["id"].as_str().unwrap());

    let patch = |status: &str| {
        request(
            "PATCH",
            &uri,
            Some(user),
            Some(serde_json::json!({ "status": status })),
        )
    };

    let (status, _) = send(&app, patch("shipped")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, patch("archived")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for next in ["processing", "shipped", "delivered"] {
        let (status, json) = send(&app, patch(next)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], next);
    }

    let (status, json) = send(&app, patch("canceled")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("delivered"));
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let app = setup();
    let (status, _) = send(
        &app,
        request("GET", "/orders/not-a-uuid", Some(UserId::new()), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_amounts_are_bad_requests() {
    let app = setup();
    let user = UserId::new();

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/products",
            Some(user),
            Some(serde_json::json!({
                "name": "Yacht",
                "price_cents": i64::MAX / 2 + 1,
                "stock": 10
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let yacht = create_product(&app, "Yacht", 100_000_000_000, u32::MAX).await;
    let jet = create_product(&app, "Jet", 100_000_000_000, u32::MAX).await;

    let (status, _) = add_to_cart(&app, user, &yacht, 100_000_000).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = add_to_cart(&app, user, &yacht, 50_000_000).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = add_to_cart(&app, user, &jet, 50_000_000).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, request("GET", "/carts", Some(user), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, request("POST", "/orders/checkout", Some(user), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
