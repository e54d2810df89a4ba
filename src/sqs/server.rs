use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use super::dialect::{json, query};
use super::error::SqsError;
use super::registry::QueueRegistry;

use tracing::debug;

fn request_host(headers: &HeaderMap) -> String {
    headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost:9324")
        .to_string()
}

async fn handle_request(
    State(registry): State<Arc<QueueRegistry>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let host = request_host(&headers);

    if let Some(target) = headers.get("x-amz-target").and_then(|v| v.to_str().ok()) {
        let action = target.rsplit('.').next().unwrap_or(target);
        debug!(action, dialect = "json", "dispatching operation");
        return match json::dispatch(&registry, action, &body, &host).await {
            Ok(resp) => resp,
            Err(err) => json_error_response(&err),
        };
    }

    let form: HashMap<String, String> = form_urlencoded::parse(&body)
        .into_owned()
        .collect();
    let Some(action) = form.get("Action").cloned() else {
        return query::error_response(&SqsError::InvalidAction("missing Action parameter".into()));
    };

    debug!(action = %action, dialect = "query", "dispatching operation");
    match query::dispatch(&registry, &action, &form, &host).await {
        Ok(resp) => resp,
        Err(err) => query::error_response(&err),
    }
}

/// Renders the shared error envelope in the JSON dialect's `__type`/`message`
/// shape, matching the wire contract real SDKs parse for retry decisions.
fn json_error_response(err: &SqsError) -> Response {
    let body = serde_json::json!({
        "__type": format!("com.amazonaws.sqs#{}", err.code()),
        "message": err.message(),
    });
    (
        err.status_code(),
        [("content-type", "application/x-amz-json-1.0")],
        Json(body),
    )
        .into_response()
}

async fn health() -> Response {
    Json(serde_json::json!({"status": "healthy"})).into_response()
}

async fn admin_page() -> Response {
    (
        [("content-type", "text/html")],
        "<html><body><h1>sqs-local</h1><p>Queue state is available at /admin/api/queues.</p></body></html>",
    )
        .into_response()
}

async fn admin_queues(State(registry): State<Arc<QueueRegistry>>) -> Response {
    let names = registry.list("").await;
    let mut snapshot = Vec::with_capacity(names.len());
    for name in names {
        if let Some(queue) = registry.get(&name).await {
            let q = queue.read().await;
            snapshot.push(serde_json::json!({
                "name": name,
                "arn": q.arn,
                "attributes": q.get_attributes(),
            }));
        }
    }
    Json(serde_json::json!({ "queues": snapshot })).into_response()
}

pub fn create_router(registry: Arc<QueueRegistry>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/admin", get(admin_page))
        .route("/admin/api/queues", get(admin_queues))
        .route("/", post(handle_request))
        .route("/{*path}", post(handle_request))
        .with_state(registry)
}
