use http_body_util::BodyExt;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use sqs_local::sqs::registry::QueueRegistry;
use sqs_local::sqs::server::create_router;
use tower::ServiceExt;

fn app() -> axum::Router {
    let registry = QueueRegistry::new("us-east-1".into(), "000000000000".into());
    create_router(registry)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(target: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("host", "localhost:9324")
        .header("content-type", "application/x-amz-json-1.0")
        .header("x-amz-target", format!("AmazonSQS.{target}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_check() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn basic_lifecycle_over_json_dialect() {
    let app = app();

    let create = app
        .clone()
        .oneshot(json_request("CreateQueue", json!({"QueueName": "q"})))
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::OK);
    let create_body = json_body(create).await;
    let queue_url = create_body["QueueUrl"].as_str().unwrap().to_string();
    assert_eq!(queue_url, "http://localhost:9324/q");

    let send = app
        .clone()
        .oneshot(json_request(
            "SendMessage",
            json!({"QueueUrl": queue_url, "MessageBody": "hello"}),
        ))
        .await
        .unwrap();
    let send_body = json_body(send).await;
    assert_eq!(send_body["MD5OfMessageBody"], "5d41402abc4b2a76b9719d911017c592");
    let message_id = send_body["MessageId"].as_str().unwrap().to_string();
    assert!(!message_id.is_empty());

    let receive = app
        .clone()
        .oneshot(json_request(
            "ReceiveMessage",
            json!({"QueueUrl": queue_url, "MaxNumberOfMessages": 1}),
        ))
        .await
        .unwrap();
    let receive_body = json_body(receive).await;
    let messages = receive_body["Messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["Body"], "hello");
    let receipt_handle = messages[0]["ReceiptHandle"].as_str().unwrap().to_string();

    let delete = app
        .clone()
        .oneshot(json_request(
            "DeleteMessage",
            json!({"QueueUrl": queue_url, "ReceiptHandle": receipt_handle}),
        ))
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::OK);

    let receive_again = app
        .clone()
        .oneshot(json_request(
            "ReceiveMessage",
            json!({"QueueUrl": queue_url, "MaxNumberOfMessages": 1}),
        ))
        .await
        .unwrap();
    let receive_again_body = json_body(receive_again).await;
    assert!(receive_again_body["Messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_action_over_query_dialect_is_invalid_action() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("host", "localhost:9324")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("Action=Bogus"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let xml = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(xml.contains("<Code>InvalidAction</Code>"));
}

#[tokio::test]
async fn fifo_queue_delivers_one_message_per_group() {
    let app = app();

    app.clone()
        .oneshot(json_request(
            "CreateQueue",
            json!({
                "QueueName": "orders.fifo",
                "Attributes": {"ContentBasedDeduplication": "true"}
            }),
        ))
        .await
        .unwrap();
    let queue_url = "http://localhost:9324/orders.fifo";

    for body in ["A1", "A2", "A3"] {
        app.clone()
            .oneshot(json_request(
                "SendMessage",
                json!({"QueueUrl": queue_url, "MessageBody": body, "MessageGroupId": "gA"}),
            ))
            .await
            .unwrap();
    }

    let receive = app
        .clone()
        .oneshot(json_request(
            "ReceiveMessage",
            json!({"QueueUrl": queue_url, "MaxNumberOfMessages": 10}),
        ))
        .await
        .unwrap();
    let body = json_body(receive).await;
    let messages = body["Messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["Body"], "A1");
}

/// A message that crosses its dead-letter receive-count limit must be moved
/// even when the opportunistic check inside `ReceiveMessage` finds it first,
/// not just the background timer. Every call below runs synchronously with
/// no sleep, so the whole test completes well inside the timer's first
/// 1-second tick — only the opportunistic path in `receive_with_long_poll`
/// can be responsible for the move this test observes.
#[tokio::test]
async fn receive_message_opportunistically_redirects_to_dlq() {
    let app = app();

    app.clone()
        .oneshot(json_request("CreateQueue", json!({"QueueName": "dlq"})))
        .await
        .unwrap();
    let dlq_arn = "arn:aws:sqs:us-east-1:000000000000:dlq";

    app.clone()
        .oneshot(json_request(
            "CreateQueue",
            json!({
                "QueueName": "main",
                "Attributes": {
                    "RedrivePolicy": json!({
                        "deadLetterTargetArn": dlq_arn,
                        "maxReceiveCount": 1
                    }).to_string()
                }
            }),
        ))
        .await
        .unwrap();
    let main_url = "http://localhost:9324/main";
    let dlq_url = "http://localhost:9324/dlq";

    app.clone()
        .oneshot(json_request(
            "SendMessage",
            json!({"QueueUrl": main_url, "MessageBody": "poison"}),
        ))
        .await
        .unwrap();

    let first = app
        .clone()
        .oneshot(json_request(
            "ReceiveMessage",
            json!({"QueueUrl": main_url, "VisibilityTimeout": 0}),
        ))
        .await
        .unwrap();
    let first_body = json_body(first).await;
    assert_eq!(first_body["Messages"].as_array().unwrap().len(), 1);

    let second = app
        .clone()
        .oneshot(json_request(
            "ReceiveMessage",
            json!({"QueueUrl": main_url, "VisibilityTimeout": 30}),
        ))
        .await
        .unwrap();
    let second_body = json_body(second).await;
    assert!(second_body["Messages"].as_array().map_or(true, |m| m.is_empty()));

    let dlq_receive = app
        .clone()
        .oneshot(json_request(
            "ReceiveMessage",
            json!({"QueueUrl": dlq_url}),
        ))
        .await
        .unwrap();
    let dlq_body = json_body(dlq_receive).await;
    let dlq_messages = dlq_body["Messages"].as_array().unwrap();
    assert_eq!(dlq_messages.len(), 1);
    assert_eq!(dlq_messages[0]["Body"], "poison");
}
