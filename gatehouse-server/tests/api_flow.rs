//! End-to-end request flows through the router over a mock backend

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use gatehouse_core::pool::mock::MockConnector;
use gatehouse_core::{ConnectionPool, PoolOptions, SessionStore};
use gatehouse_server::{build_router, AppState, AuthSettings, MemoryDirectory, MockHasher};

async fn started_state(options: PoolOptions) -> AppState<MockConnector> {
    let pool = ConnectionPool::new(MockConnector::new());
    pool.init(options).await;
    AppState::new(
        pool,
        SessionStore::new(),
        Arc::new(MemoryDirectory::new()),
        Arc::new(MockHasher),
        AuthSettings::default(),
    )
}

fn app(state: &AppState<MockConnector>) -> Router {
    build_router(state.clone(), Duration::from_secs(5))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_with_token(uri: &str, header: &str, value: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header, value)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn register_and_login(state: &AppState<MockConnector>, email: &str) -> String {
    let (status, _) = send(
        app(state),
        post_json(
            "/api/register",
            json!({ "name": "INVITE2024", "email": email, "password": "pw" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app(state),
        post_json("/api/login", json!({ "email": email, "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn full_session_lifecycle() {
    let state = started_state(PoolOptions::new(2, 1)).await;
    let token = register_and_login(&state, "alice@example.com").await;

    let (status, body) = send(
        app(&state),
        post_with_token("/api/business", "authorization", &format!("Bearer {}", token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["role"], "user");

    let (status, body) = send(
        app(&state),
        post_with_token("/api/logout", "token", &token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send(
        app(&state),
        post_with_token("/api/business", "authorization", &token),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let status = state.pool().status();
    assert_eq!(status.idle, status.total_live);
}

#[tokio::test]
async fn business_without_token_is_401() {
    let state = started_state(PoolOptions::new(1, 0)).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/business")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(&state), request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "missing or invalid token");
    assert_eq!(state.pool().connector().connects(), 0);
}

#[tokio::test]
async fn business_after_pool_shutdown_is_503() {
    let state = started_state(PoolOptions::new(1, 1)).await;
    let token = register_and_login(&state, "bob@example.com").await;
    state.pool().shutdown().await;

    let (status, body) = send(
        app(&state),
        post_with_token("/api/business", "authorization", &format!("Bearer {}", token)),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn register_rejections() {
    let state = started_state(PoolOptions::new(1, 0)).await;
    register_and_login(&state, "carol@example.com").await;

    let (status, _) = send(
        app(&state),
        post_json(
            "/api/register",
            json!({ "name": "WRONG", "email": "dave@example.com", "password": "pw" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        app(&state),
        post_json(
            "/api/register",
            json!({ "name": "INVITE2024", "email": "carol@example.com", "password": "pw" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "email already registered");

    let request = Request::builder()
        .method("POST")
        .uri("/api/register")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(app(&state), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("JSON parse error"));
}

#[tokio::test]
async fn wrong_password_is_401() {
    let state = started_state(PoolOptions::new(1, 0)).await;
    register_and_login(&state, "erin@example.com").await;

    let (status, body) = send(
        app(&state),
        post_json(
            "/api/login",
            json!({ "email": "erin@example.com", "password": "guess" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid email or password");
}

#[tokio::test]
async fn health_reports_counts() {
    let state = started_state(PoolOptions::new(4, 2)).await;
    register_and_login(&state, "frank@example.com").await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(&state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["pool"]["total_live"], 2);
    assert_eq!(body["pool"]["max_size"], 4);
    assert_eq!(body["sessions"], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_business_requests_share_a_small_pool() {
    let state = started_state(PoolOptions::new(2, 0)).await;
    let token = register_and_login(&state, "grace@example.com").await;

    let requests: Vec<_> = (0..20)
        .map(|_| {
            let app = app(&state);
            let header = format!("Bearer {}", token);
            tokio::spawn(async move {
                send(app, post_with_token("/api/business", "authorization", &header))
                    .await
                    .0
            })
        })
        .collect();

    for request in requests {
        assert_eq!(request.await.unwrap(), StatusCode::OK);
    }

    let status = state.pool().status();
    assert!(status.total_live <= 2);
    assert!(state.pool().connector().connects() <= 2);
}
