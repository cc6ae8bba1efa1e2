use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::{postgres, testcontainers};
use todo_api::routes;
use todo_api::state::AppState;
use todo_api::store::MemoryStore;
use tower::ServiceExt;

/// A fresh service backed by an empty in-memory store.
pub fn setup_app() -> Router {
    // Allow multiple calls to init for tests.
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    routes::app(AppState::new(MemoryStore::new()))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Sends one request; an empty response body is reported as `Value::Null`.
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    TestResponse { status, body }
}

/// Sends a raw, possibly malformed, body.
#[allow(dead_code)]
pub async fn send_raw(app: &Router, method: Method, uri: &str, body: &'static str) -> TestResponse {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    TestResponse { status, body }
}

/// Creates a todo with only the required fields and returns its id.
#[allow(dead_code)]
pub async fn create_todo(app: &Router, title: &str) -> i64 {
    let response = send(
        app,
        Method::POST,
        "/api/todos/",
        Some(serde_json::json!({"title": title, "due_date": "2024-05-01"})),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    response.body["id"].as_i64().unwrap()
}

/// Logs `minutes` against a todo and returns the entry id.
#[allow(dead_code)]
pub async fn create_time_entry(app: &Router, todo: i64, minutes: i32) -> i64 {
    let response = send(
        app,
        Method::POST,
        "/api/times/",
        Some(serde_json::json!({
            "todo": todo,
            "week_start_date": "2024-04-29",
            "minutes_spent": minutes
        })),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    response.body["id"].as_i64().unwrap()
}

/// Starts a throwaway PostgreSQL server.
#[allow(dead_code)]
pub async fn setup_container() -> anyhow::Result<testcontainers::ContainerAsync<postgres::Postgres>>
{
    let container = postgres::Postgres::default().start().await?;
    Ok(container)
}

#[allow(dead_code)]
pub async fn database_url(
    container: &testcontainers::ContainerAsync<postgres::Postgres>,
) -> anyhow::Result<String> {
    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5432).await?;
    Ok(format!("postgres://postgres:postgres@{}:{}/postgres", host, port))
}
