use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::sqs::error::SqsError;
use crate::sqs::message::MessageAttributeValue;
use crate::sqs::registry::QueueRegistry;

use super::{attributes_from_map, filter_attributes, queue_url};

fn xml_response<T: Serialize>(root_tag: &str, value: &T) -> Response {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    xml.push('<');
    xml.push_str(root_tag);
    xml.push_str("Response xmlns=\"http://queue.amazonaws.com/doc/2012-11-05/\">");
    if let Ok(s) = quick_xml::se::to_string(value) {
        xml.push_str(&s);
    }
    xml.push_str("<ResponseMetadata><RequestId>");
    xml.push_str(&uuid::Uuid::new_v4().to_string());
    xml.push_str("</RequestId></ResponseMetadata></");
    xml.push_str(root_tag);
    xml.push_str("Response>");
    (StatusCode::OK, [("content-type", "text/xml")], xml).into_response()
}

fn xml_empty_response(root_tag: &str) -> Response {
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><{root_tag}Response xmlns=\"http://queue.amazonaws.com/doc/2012-11-05/\"><ResponseMetadata><RequestId>{}</RequestId></ResponseMetadata></{root_tag}Response>",
        uuid::Uuid::new_v4()
    );
    (StatusCode::OK, [("content-type", "text/xml")], xml).into_response()
}

/// Renders the shared error envelope in the query dialect's XML shape.
pub fn error_response(err: &SqsError) -> Response {
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><ErrorResponse xmlns=\"http://queue.amazonaws.com/doc/2012-11-05/\"><Error><Type>Sender</Type><Code>{}</Code><Message>{}</Message></Error><RequestId>{}</RequestId></ErrorResponse>",
        err.code(),
        escape_xml_text(err.message()),
        uuid::Uuid::new_v4()
    );
    (err.status_code(), [("content-type", "text/xml")], xml).into_response()
}

fn escape_xml_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Decodes `Attribute.N.Name` / `Attribute.N.Value` form fields into a map.
/// 1-indexed and contiguous; iteration stops at the first missing name.
fn parse_indexed_attributes(form: &HashMap<String, String>, prefix: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut i = 1;
    loop {
        let name_key = format!("{prefix}.{i}.Name");
        let Some(name) = form.get(&name_key) else {
            break;
        };
        let value = form.get(&format!("{prefix}.{i}.Value")).cloned().unwrap_or_default();
        attrs.insert(name.clone(), value);
        i += 1;
    }
    attrs
}

/// Decodes `MessageAttribute.N.Name` / `.Value.{DataType,StringValue,
/// BinaryValue}` form fields, the query dialect's analogue of the
/// `Attribute.N.*` convention above. 1-indexed and contiguous.
fn parse_indexed_message_attributes(
    form: &HashMap<String, String>,
    prefix: &str,
) -> HashMap<String, MessageAttributeValue> {
    let mut attrs = HashMap::new();
    let mut i = 1;
    loop {
        let name_key = format!("{prefix}.{i}.Name");
        let Some(name) = form.get(&name_key) else {
            break;
        };
        let data_type = form
            .get(&format!("{prefix}.{i}.Value.DataType"))
            .cloned()
            .unwrap_or_default();
        let string_value = form.get(&format!("{prefix}.{i}.Value.StringValue")).cloned();
        let binary_value = form.get(&format!("{prefix}.{i}.Value.BinaryValue")).cloned();
        attrs.insert(
            name.clone(),
            MessageAttributeValue {
                data_type,
                string_value,
                binary_value,
            },
        );
        i += 1;
    }
    attrs
}

fn parse_indexed_list(form: &HashMap<String, String>, prefix: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = 1;
    loop {
        let key = format!("{prefix}.{i}");
        let Some(v) = form.get(&key) else {
            break;
        };
        out.push(v.clone());
        i += 1;
    }
    out
}

fn parse_u32(form: &HashMap<String, String>, key: &str, default: u32) -> u32 {
    form.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Serialize)]
struct CreateQueueResult {
    #[serde(rename = "QueueUrl")]
    queue_url: String,
}

#[derive(Serialize)]
struct ListQueuesResult {
    #[serde(rename = "QueueUrl")]
    queue_urls: Vec<String>,
}

#[derive(Serialize)]
struct SendMessageResult {
    #[serde(rename = "MD5OfMessageBody")]
    md5_of_message_body: String,
    #[serde(rename = "MessageId")]
    message_id: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "SequenceNumber")]
    sequence_number: Option<String>,
}

#[derive(Serialize)]
struct AttributeEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Serialize)]
struct MessageAttributeEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value")]
    value: MessageAttributeValueXml,
}

#[derive(Serialize)]
struct MessageAttributeValueXml {
    #[serde(rename = "DataType")]
    data_type: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "StringValue")]
    string_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "BinaryValue")]
    binary_value: Option<String>,
}

#[derive(Serialize)]
struct ReceiveMessageEntry {
    #[serde(rename = "MessageId")]
    message_id: String,
    #[serde(rename = "ReceiptHandle")]
    receipt_handle: String,
    #[serde(rename = "MD5OfBody")]
    md5_of_body: String,
    #[serde(rename = "Body")]
    body: String,
    #[serde(rename = "Attribute")]
    attribute: Vec<AttributeEntry>,
    #[serde(rename = "MessageAttribute")]
    message_attribute: Vec<MessageAttributeEntry>,
}

#[derive(Serialize)]
struct ReceiveMessageResult {
    #[serde(rename = "Message")]
    message: Vec<ReceiveMessageEntry>,
}

#[derive(Serialize)]
struct GetQueueAttributesResult {
    #[serde(rename = "Attribute")]
    attribute: Vec<AttributeEntry>,
}

#[derive(Serialize)]
struct StartMessageMoveTaskResult {
    #[serde(rename = "TaskHandle")]
    task_handle: String,
}

#[derive(Serialize)]
struct ListMessageMoveTasksResult {
    #[serde(rename = "Result")]
    result: Vec<AttributeEntry>,
}

#[derive(Serialize)]
struct CancelMessageMoveTaskResult {
    #[serde(rename = "ApproximateNumberOfMessagesMoved")]
    approximate_number_of_messages_moved: u64,
}

/// Dispatches a query-dialect operation (the `Action` form field) to the
/// registry and renders the response as `text/xml`.
pub async fn dispatch(
    registry: &Arc<QueueRegistry>,
    action: &str,
    form: &HashMap<String, String>,
    host: &str,
) -> Result<Response, SqsError> {
    match action {
        "CreateQueue" => {
            let name = form
                .get("QueueName")
                .cloned()
                .ok_or_else(|| SqsError::MissingParameter("QueueName is required".into()))?;
            let raw_attrs = parse_indexed_attributes(form, "Attribute");
            let attrs = attributes_from_map(&raw_attrs).map_err(SqsError::InvalidParameterValue)?;
            registry.create(name.clone(), attrs).await?;
            Ok(xml_response(
                "CreateQueue",
                &CreateQueueResult {
                    queue_url: queue_url(host, &name),
                },
            ))
        }
        "DeleteQueue" => {
            let name = queue_name(form)?;
            registry.delete(&name).await;
            Ok(xml_empty_response("DeleteQueue"))
        }
        "ListQueues" => {
            let prefix = form.get("QueueNamePrefix").cloned().unwrap_or_default();
            let names = registry.list(&prefix).await;
            Ok(xml_response(
                "ListQueues",
                &ListQueuesResult {
                    queue_urls: names.iter().map(|n| queue_url(host, n)).collect(),
                },
            ))
        }
        "SendMessage" => {
            let name = queue_name(form)?;
            let queue = registry.require(&name).await?;
            let body = form
                .get("MessageBody")
                .cloned()
                .ok_or_else(|| SqsError::MissingParameter("MessageBody is required".into()))?;
            let delay_seconds = form.get("DelaySeconds").and_then(|v| v.parse().ok());
            let dedup_id = form.get("MessageDeduplicationId").cloned();
            let group_id = form.get("MessageGroupId").cloned();
            let message_attributes = parse_indexed_message_attributes(form, "MessageAttribute");
            let outcome = {
                let mut q = queue.write().await;
                q.send(
                    body,
                    message_attributes,
                    delay_seconds,
                    dedup_id,
                    group_id,
                    "AIDACKCEVSQ6C2EXAMPLE",
                )?
            };
            if let Some(notify) = registry.get_notify(&name).await {
                notify.notify_waiters();
            }
            Ok(xml_response(
                "SendMessage",
                &SendMessageResult {
                    md5_of_message_body: outcome.md5_of_body,
                    message_id: outcome.message_id,
                    sequence_number: outcome.sequence_number,
                },
            ))
        }
        "ReceiveMessage" => {
            let name = queue_name(form)?;
            let queue = registry.require(&name).await?;
            let notify = registry.get_notify(&name).await;
            let max_count = parse_u32(form, "MaxNumberOfMessages", 1);
            let visibility_timeout = parse_u32(form, "VisibilityTimeout", 30);
            let wait_time = parse_u32(form, "WaitTimeSeconds", 0);
            let attribute_names = parse_indexed_list(form, "AttributeName");
            let message_attribute_names = parse_indexed_list(form, "MessageAttributeName");

            let messages = super::json::receive_with_long_poll(
                registry,
                &name,
                &queue,
                notify,
                max_count,
                visibility_timeout,
                wait_time,
            )
            .await;

            let entries = messages
                .into_iter()
                .map(|m| ReceiveMessageEntry {
                    message_id: m.message_id,
                    receipt_handle: m.receipt_handle,
                    md5_of_body: m.md5_of_body,
                    body: m.body,
                    attribute: to_attribute_entries(filter_attributes(&m.attributes, &attribute_names)),
                    message_attribute: super::filter_message_attributes(
                        &m.message_attributes,
                        &message_attribute_names,
                    )
                    .into_iter()
                    .map(|(name, v)| MessageAttributeEntry {
                        name,
                        value: MessageAttributeValueXml {
                            data_type: v.data_type,
                            string_value: v.string_value,
                            binary_value: v.binary_value,
                        },
                    })
                    .collect(),
                })
                .collect();
            Ok(xml_response("ReceiveMessage", &ReceiveMessageResult { message: entries }))
        }
        "DeleteMessage" => {
            let name = queue_name(form)?;
            let queue = registry.require(&name).await?;
            let receipt_handle = form
                .get("ReceiptHandle")
                .ok_or_else(|| SqsError::MissingParameter("ReceiptHandle is required".into()))?;
            let deleted = queue.write().await.delete(receipt_handle);
            if !deleted {
                return Err(SqsError::ReceiptHandleIsInvalid(
                    "receipt handle does not match an in-flight message".into(),
                ));
            }
            Ok(xml_empty_response("DeleteMessage"))
        }
        "GetQueueAttributes" => {
            let name = queue_name(form)?;
            let queue = registry.require(&name).await?;
            let requested = parse_indexed_list(form, "AttributeName");
            let all = queue.read().await.get_attributes();
            Ok(xml_response(
                "GetQueueAttributes",
                &GetQueueAttributesResult {
                    attribute: to_attribute_entries(filter_attributes(&all, &requested)),
                },
            ))
        }
        "SetQueueAttributes" => {
            let name = queue_name(form)?;
            let queue = registry.require(&name).await?;
            let attrs = parse_indexed_attributes(form, "Attribute");
            queue.write().await.set_attributes(&attrs)?;
            Ok(xml_empty_response("SetQueueAttributes"))
        }
        "PurgeQueue" => {
            let name = queue_name(form)?;
            let queue = registry.require(&name).await?;
            queue.write().await.purge();
            Ok(xml_empty_response("PurgeQueue"))
        }
        "StartMessageMoveTask" => {
            let source_arn = form
                .get("SourceArn")
                .cloned()
                .ok_or_else(|| SqsError::MissingParameter("SourceArn is required".into()))?;
            let destination_arn = form.get("DestinationArn").map(String::as_str);
            let task_handle = super::json::run_move_task(registry, &source_arn, destination_arn).await?;
            Ok(xml_response(
                "StartMessageMoveTask",
                &StartMessageMoveTaskResult { task_handle },
            ))
        }
        "ListMessageMoveTasks" => Ok(xml_response(
            "ListMessageMoveTasks",
            &ListMessageMoveTasksResult { result: Vec::new() },
        )),
        "CancelMessageMoveTask" => Ok(xml_response(
            "CancelMessageMoveTask",
            &CancelMessageMoveTaskResult {
                approximate_number_of_messages_moved: 0,
            },
        )),
        other => Err(SqsError::InvalidAction(format!("Unknown action: {other}"))),
    }
}

fn queue_name(form: &HashMap<String, String>) -> Result<String, SqsError> {
    form.get("QueueUrl")
        .map(|url| QueueRegistry::name_from_queue_url(url))
        .ok_or_else(|| SqsError::MissingParameter("QueueUrl is required".into()))
}

fn to_attribute_entries(map: HashMap<String, String>) -> Vec<AttributeEntry> {
    map.into_iter().map(|(name, value)| AttributeEntry { name, value }).collect()
}
