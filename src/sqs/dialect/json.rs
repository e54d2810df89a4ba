use std::collections::HashMap;
use std::sync::Arc;

use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::sqs::error::SqsError;
use crate::sqs::message::MessageAttributeValue;
use crate::sqs::queue::Queue;
use crate::sqs::registry::QueueRegistry;

use super::{attributes_from_map, filter_attributes, filter_message_attributes, queue_url};

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateQueueRequest {
    queue_name: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateQueueResponse {
    queue_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteQueueRequest {
    queue_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListQueuesRequest {
    #[serde(default)]
    queue_name_prefix: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListQueuesResponse {
    queue_urls: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageRequest {
    queue_url: String,
    message_body: String,
    #[serde(default)]
    delay_seconds: Option<u32>,
    #[serde(default)]
    message_attributes: HashMap<String, MessageAttributeValue>,
    #[serde(default)]
    message_deduplication_id: Option<String>,
    #[serde(default)]
    message_group_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageResponse {
    message_id: String,
    md5_of_message_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_number: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageRequest {
    queue_url: String,
    #[serde(default = "default_max_messages")]
    max_number_of_messages: u32,
    #[serde(default = "default_visibility_timeout")]
    visibility_timeout: u32,
    #[serde(default)]
    wait_time_seconds: u32,
    #[serde(default)]
    attribute_names: Vec<String>,
    #[serde(default)]
    message_attribute_names: Vec<String>,
}

fn default_max_messages() -> u32 {
    1
}

fn default_visibility_timeout() -> u32 {
    30
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReceivedMessageOut {
    message_id: String,
    receipt_handle: String,
    md5_of_body: String,
    body: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    attributes: HashMap<String, String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    message_attributes: HashMap<String, MessageAttributeValue>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageResponse {
    messages: Vec<ReceivedMessageOut>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteMessageRequest {
    queue_url: String,
    receipt_handle: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueueAttributesRequest {
    queue_url: String,
    #[serde(default)]
    attribute_names: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueueAttributesResponse {
    attributes: HashMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SetQueueAttributesRequest {
    queue_url: String,
    attributes: HashMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PurgeQueueRequest {
    queue_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartMessageMoveTaskRequest {
    source_arn: String,
    #[serde(default)]
    destination_arn: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartMessageMoveTaskResponse {
    task_handle: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListMessageMoveTasksRequest {
    #[serde(default)]
    source_arn: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListMessageMoveTasksResponse {
    results: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CancelMessageMoveTaskRequest {
    #[serde(default)]
    task_handle: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CancelMessageMoveTaskResponse {
    approximate_number_of_messages_moved: u64,
}

fn ok(value: impl Serialize) -> axum::response::Response {
    Json(value).into_response()
}

fn empty() -> axum::response::Response {
    Json(serde_json::json!({})).into_response()
}

fn parse<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T, SqsError> {
    serde_json::from_slice(body)
        .map_err(|e| SqsError::InvalidParameterValue(format!("could not parse request body: {e}")))
}

/// Dispatches a JSON-dialect operation (`X-Amz-Target` suffix already
/// stripped of its service prefix) to the registry and renders the response
/// as `application/x-amz-json-1.0`.
pub async fn dispatch(
    registry: &Arc<QueueRegistry>,
    action: &str,
    body: &[u8],
    host: &str,
) -> Result<axum::response::Response, SqsError> {
    match action {
        "CreateQueue" => {
            let req: CreateQueueRequest = parse(body)?;
            let attrs = attributes_from_map(&req.attributes)
                .map_err(SqsError::InvalidParameterValue)?;
            registry.create(req.queue_name.clone(), attrs).await?;
            Ok(ok(CreateQueueResponse {
                queue_url: queue_url(host, &req.queue_name),
            }))
        }
        "DeleteQueue" => {
            let req: DeleteQueueRequest = parse(body)?;
            let name = QueueRegistry::name_from_queue_url(&req.queue_url);
            registry.delete(&name).await;
            Ok(empty())
        }
        "ListQueues" => {
            let req: ListQueuesRequest = parse(body)?;
            let names = registry.list(&req.queue_name_prefix).await;
            Ok(ok(ListQueuesResponse {
                queue_urls: names.iter().map(|n| queue_url(host, n)).collect(),
            }))
        }
        "SendMessage" => {
            let req: SendMessageRequest = parse(body)?;
            let name = QueueRegistry::name_from_queue_url(&req.queue_url);
            let queue = registry.require(&name).await?;
            let outcome = {
                let mut q = queue.write().await;
                q.send(
                    req.message_body,
                    req.message_attributes,
                    req.delay_seconds,
                    req.message_deduplication_id,
                    req.message_group_id,
                    "AIDACKCEVSQ6C2EXAMPLE",
                )?
            };
            if let Some(notify) = registry.get_notify(&name).await {
                notify.notify_waiters();
            }
            Ok(ok(SendMessageResponse {
                message_id: outcome.message_id,
                md5_of_message_body: outcome.md5_of_body,
                sequence_number: outcome.sequence_number,
            }))
        }
        "ReceiveMessage" => {
            let req: ReceiveMessageRequest = parse(body)?;
            let name = QueueRegistry::name_from_queue_url(&req.queue_url);
            let queue = registry.require(&name).await?;
            let notify = registry.get_notify(&name).await;
            let messages = receive_with_long_poll(
                registry,
                &name,
                &queue,
                notify,
                req.max_number_of_messages,
                req.visibility_timeout,
                req.wait_time_seconds,
            )
            .await;
            let out = messages
                .into_iter()
                .map(|m| ReceivedMessageOut {
                    message_id: m.message_id,
                    receipt_handle: m.receipt_handle,
                    md5_of_body: m.md5_of_body,
                    body: m.body,
                    attributes: filter_attributes(&m.attributes, &req.attribute_names),
                    message_attributes: filter_message_attributes(
                        &m.message_attributes,
                        &req.message_attribute_names,
                    ),
                })
                .collect();
            Ok(ok(ReceiveMessageResponse { messages: out }))
        }
        "DeleteMessage" => {
            let req: DeleteMessageRequest = parse(body)?;
            let name = QueueRegistry::name_from_queue_url(&req.queue_url);
            let queue = registry.require(&name).await?;
            let deleted = queue.write().await.delete(&req.receipt_handle);
            if !deleted {
                return Err(SqsError::ReceiptHandleIsInvalid(
                    "receipt handle does not match an in-flight message".into(),
                ));
            }
            Ok(empty())
        }
        "GetQueueAttributes" => {
            let req: GetQueueAttributesRequest = parse(body)?;
            let name = QueueRegistry::name_from_queue_url(&req.queue_url);
            let queue = registry.require(&name).await?;
            let all = queue.read().await.get_attributes();
            Ok(ok(GetQueueAttributesResponse {
                attributes: filter_attributes(&all, &req.attribute_names),
            }))
        }
        "SetQueueAttributes" => {
            let req: SetQueueAttributesRequest = parse(body)?;
            let name = QueueRegistry::name_from_queue_url(&req.queue_url);
            let queue = registry.require(&name).await?;
            queue.write().await.set_attributes(&req.attributes)?;
            Ok(empty())
        }
        "PurgeQueue" => {
            let req: PurgeQueueRequest = parse(body)?;
            let name = QueueRegistry::name_from_queue_url(&req.queue_url);
            let queue = registry.require(&name).await?;
            queue.write().await.purge();
            Ok(empty())
        }
        "StartMessageMoveTask" => {
            let req: StartMessageMoveTaskRequest = parse(body)?;
            let task_handle = run_move_task(registry, &req.source_arn, req.destination_arn.as_deref())
                .await?;
            Ok(ok(StartMessageMoveTaskResponse { task_handle }))
        }
        "ListMessageMoveTasks" => {
            let _req: ListMessageMoveTasksRequest = parse(body)?;
            Ok(ok(ListMessageMoveTasksResponse { results: Vec::new() }))
        }
        "CancelMessageMoveTask" => {
            let _req: CancelMessageMoveTaskRequest = parse(body)?;
            Ok(ok(CancelMessageMoveTaskResponse {
                approximate_number_of_messages_moved: 0,
            }))
        }
        other => Err(SqsError::InvalidAction(format!("Unknown action: {other}"))),
    }
}

/// Resolves a `StartMessageMoveTask` call: explicit destination ARN, or a
/// registry scan for the unique queue whose `RedrivePolicy` names `source`.
pub async fn run_move_task(
    registry: &Arc<QueueRegistry>,
    source_arn: &str,
    destination_arn: Option<&str>,
) -> Result<String, SqsError> {
    let source_name = source_arn.rsplit(':').next().unwrap_or(source_arn).to_string();
    let destination_name = match destination_arn {
        Some(arn) => arn.rsplit(':').next().unwrap_or(arn).to_string(),
        None => registry.find_dlq_source(source_arn).await.ok_or_else(|| {
            SqsError::InvalidParameterValue(
                "no queue's RedrivePolicy targets the given source".into(),
            )
        })?,
    };
    registry.redrive(&source_name, &destination_name, usize::MAX).await?;
    Ok(registry.register_move_task(source_arn).await)
}

/// `ReceiveMessage` with long-poll suspension: retries the selection once
/// more after waiting on the queue's notify signal (bounded by wait-time) if
/// the first attempt came back empty. The opportunistic expiry check before
/// each selection attempt redirects any over-limit message to its
/// dead-letter target through `registry`, the same way the background timer
/// does, so a blocked long-poll consumer observes the move within this call.
pub async fn receive_with_long_poll(
    registry: &Arc<QueueRegistry>,
    queue_name: &str,
    queue: &Arc<tokio::sync::RwLock<Queue>>,
    notify: Option<Arc<tokio::sync::Notify>>,
    max_count: u32,
    visibility_timeout: u32,
    wait_time_seconds: u32,
) -> Vec<crate::sqs::queue::ReceivedMessage> {
    let redrives = queue.write().await.expire_and_redrive();
    if !redrives.is_empty() {
        registry.redirect_dlq_redrives(queue_name, redrives).await;
    }
    let messages = queue
        .write()
        .await
        .receive(max_count, visibility_timeout, "AIDACKCEVSQ6C2EXAMPLE");
    if !messages.is_empty() || wait_time_seconds == 0 {
        return messages;
    }

    if let Some(notify) = notify {
        let _ = tokio::time::timeout(
            std::time::Duration::from_secs(wait_time_seconds as u64),
            notify.notified(),
        )
        .await;
    } else {
        tokio::time::sleep(std::time::Duration::from_secs(wait_time_seconds as u64)).await;
    }

    let redrives = queue.write().await.expire_and_redrive();
    if !redrives.is_empty() {
        registry.redirect_dlq_redrives(queue_name, redrives).await;
    }
    queue
        .write()
        .await
        .receive(max_count, visibility_timeout, "AIDACKCEVSQ6C2EXAMPLE")
}
