mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use common::*;
use serde_json::{Value, json};
use ticketgate::domain::ports::RowStore;
use ticketgate::domain::registration::RegistrationRow;
use ticketgate::infrastructure::in_memory::InMemoryPendingStore;
use ticketgate::interfaces::http::handlers::WELCOME_TEXT;
use ticketgate::interfaces::http::router;
use tower::ServiceExt;

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn registration() -> Value {
    json!({
        "name": "Asha Rao",
        "email": "asha@example.com",
        "phone": "9999999999",
        "amount": 1499,
        "packageType": "gold",
        "address": "12 MG Road"
    })
}

#[tokio::test]
async fn test_welcome() {
    let h = Harness::new();
    let app = router(vec![h.service.clone()]);

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), WELCOME_TEXT);
}

#[tokio::test]
async fn test_check_registration() {
    let h = Harness::new();
    h.rows
        .inner
        .append(RegistrationRow {
            email: "taken@example.com".to_string(),
            phone: "8888888888".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let app = router(vec![h.service.clone()]);

    let (status, body) = send_json(
        &app,
        post_json(
            "/api/check-registration",
            json!({ "email": "asha@example.com", "phone": "9999999999" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send_json(
        &app,
        post_json(
            "/api/check-registration",
            json!({ "email": "new@example.com", "phone": "8888888888" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Already registered");
    assert_eq!(body["message"], "Phone number is already registered");
}

#[tokio::test]
async fn test_register_then_callback() {
    let h = Harness::new();
    let app = router(vec![h.service.clone()]);

    let (status, body) = send_json(&app, post_json("/api/register", registration())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let order_id = body["orderId"].as_str().unwrap().to_string();
    assert!(order_id.starts_with("ORDER_"));
    assert_eq!(body["paymentUrl"], format!("https://pay.example.com/{order_id}"));
    assert!(body["ticketNumber"].as_str().unwrap().starts_with("BSKTETC24"));

    let requests = h.gateway.requests.lock().await.clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount_minor, 149900);
    assert_eq!(requests[0].callback_url, "https://api.example.com/api/payment-callback");
    assert_eq!(requests[0].redirect_url, "https://api.example.com/api/verify");

    let response = callback_response(&order_id, "PAYMENT_SUCCESS", Some("T1"));
    let request = Request::builder()
        .method("POST")
        .uri("/api/payment-callback")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-VERIFY", sign_callback(&response))
        .body(Body::from(json!({ "response": response }).to_string()))
        .unwrap();
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "status": "success" }));

    let rows = h.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].address, "12 MG Road");

    // Registering again with the same email is now a duplicate.
    let (status, body) = send_json(&app, post_json("/api/register", registration())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email is already registered");
}

#[tokio::test]
async fn test_callback_rejections() {
    let h = Harness::new();
    h.seed(pending("summit", "ORDER_1", "asha@example.com", "9999999999")).await;
    let app = router(vec![h.service.clone()]);
    let response = callback_response("ORDER_1", "PAYMENT_SUCCESS", Some("T1"));

    let (status, body) = send_json(
        &app,
        post_json("/api/payment-callback", json!({ "response": response })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid checksum");

    let unknown = callback_response("ORDER_2", "PAYMENT_SUCCESS", Some("T2"));
    let request = Request::builder()
        .method("POST")
        .uri("/api/payment-callback")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-VERIFY", sign_callback(&unknown))
        .body(Body::from(json!({ "response": unknown }).to_string()))
        .unwrap();
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Registration data not found");

    assert!(h.rows().await.is_empty());
}

#[tokio::test]
async fn test_invalid_bodies_are_bad_requests() {
    let h = Harness::new();
    let app = router(vec![h.service.clone()]);

    let request = Request::builder()
        .method("POST")
        .uri("/api/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request");

    let mut missing_email = registration();
    missing_email["email"] = json!("");
    let (status, _) = send_json(&app, post_json("/api/register", missing_email)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.gateway.requests.lock().await.is_empty());
}

#[tokio::test]
async fn test_payment_status() {
    let h = Harness::new();
    let app = router(vec![h.service.clone()]);

    let (status, body) = send_json(
        &app,
        post_json("/api/check-payment-status", json!({ "orderId": "ORDER_1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "success");
    assert_eq!(body["transactionId"], "T-ORDER_1");
    assert_eq!(body["details"]["state"], "COMPLETED");

    let (status, _) = send_json(&app, post_json("/api/check-payment-status", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_page_redirects_to_frontend() {
    let h = Harness::new();
    let app = router(vec![h.service.clone()]);

    for method in ["GET", "POST"] {
        let request = Request::builder()
            .method(method)
            .uri("/api/verify")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let page = String::from_utf8(body).unwrap();
        assert!(page.contains("https://example.com/payment-status"));
    }
}

#[tokio::test]
async fn test_events_are_mounted_separately() {
    let shared = InMemoryPendingStore::new();
    let summit = Harness::with_gateway(summit(), shared.clone(), FakeGateway::default());
    let evolve = Harness::with_gateway(evolve(), shared, FakeGateway::default());
    let app = router(vec![summit.service.clone(), evolve.service.clone()]);

    let (status, body) = send_json(&app, post_json("/api/evolve/register", registration())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["ticketNumber"].as_str().unwrap().starts_with("EVOLVE"));

    let requests = evolve.gateway.requests.lock().await.clone();
    assert_eq!(
        requests[0].callback_url,
        "https://api.example.com/api/evolve/payment-callback"
    );
    assert!(summit.gateway.requests.lock().await.is_empty());

    let order_id = body["orderId"].as_str().unwrap().to_string();
    let response = callback_response(&order_id, "PAYMENT_SUCCESS", Some("T7"));
    let request = Request::builder()
        .method("POST")
        .uri("/api/evolve/payment-callback")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-VERIFY", sign_callback(&response))
        .body(Body::from(json!({ "response": response }).to_string()))
        .unwrap();
    let (status, _) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(evolve.rows().await.len(), 1);
    assert!(summit.rows().await.is_empty());
}
