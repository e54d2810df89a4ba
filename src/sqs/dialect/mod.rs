pub mod json;
pub mod query;

use std::collections::HashMap;

use crate::sqs::message::MessageAttributeValue;
use crate::sqs::queue::QueueAttributes;

/// Builds the queue URL returned to callers: `http://<host>/<name>`.
pub fn queue_url(host: &str, name: &str) -> String {
    format!("http://{host}/{name}")
}

pub fn attributes_from_map(map: &HashMap<String, String>) -> Result<QueueAttributes, String> {
    let mut attrs = QueueAttributes::default();
    attrs.apply(map).map_err(|e| e.to_string())?;
    Ok(attrs)
}

/// System attributes reported on a received message, restricted to the
/// requested names (`All` or `*` selects everything).
pub fn filter_attributes(
    attrs: &HashMap<String, String>,
    requested: &[String],
) -> HashMap<String, String> {
    if requested.is_empty() {
        return HashMap::new();
    }
    if requested.iter().any(|r| r == "All" || r == "*") {
        return attrs.clone();
    }
    attrs
        .iter()
        .filter(|(k, _)| requested.iter().any(|r| r == *k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub fn filter_message_attributes(
    attrs: &HashMap<String, MessageAttributeValue>,
    requested: &[String],
) -> HashMap<String, MessageAttributeValue> {
    if requested.is_empty() {
        return HashMap::new();
    }
    if requested.iter().any(|r| r == "All" || r == "*") {
        return attrs.clone();
    }
    attrs
        .iter()
        .filter(|(k, _)| requested.iter().any(|r| r == *k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
