use std::collections::HashMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single user-supplied message attribute, carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessageAttributeValue {
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub string_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub binary_value: Option<String>,
}

pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// One message in a queue's admission order. Lives either in `Queue::messages`
/// (delayed or visible) or in `Queue::inflight` (received, not yet deleted or
/// expired) — never both, and never copied between the two.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub body: String,
    pub md5_of_body: String,
    pub attributes: HashMap<String, MessageAttributeValue>,
    pub dedup_id: Option<String>,
    pub group_id: Option<String>,
    pub sequence_number: Option<u64>,
    pub sent_at_millis: u64,
    pub sender_id: String,
    /// Earliest instant at which the message becomes eligible for delivery.
    pub delay_until: Instant,
    /// Set only while the message is in flight; `None` means immediately eligible.
    pub visibility_until: Option<Instant>,
    pub receive_count: u32,
    pub first_received_at_millis: Option<u64>,
    pub receipt_token: Option<String>,
}

impl Message {
    pub fn new(
        body: String,
        attributes: HashMap<String, MessageAttributeValue>,
        dedup_id: Option<String>,
        group_id: Option<String>,
        sequence_number: Option<u64>,
        delay_until: Instant,
        sender_id: String,
    ) -> Self {
        let md5_of_body = md5_hex(body.as_bytes());
        Message {
            id: Uuid::new_v4().to_string(),
            body,
            md5_of_body,
            attributes,
            dedup_id,
            group_id,
            sequence_number,
            sent_at_millis: now_millis(),
            sender_id,
            delay_until,
            visibility_until: None,
            receive_count: 0,
            first_received_at_millis: None,
            receipt_token: None,
        }
    }

    pub fn is_eligible(&self, now: Instant) -> bool {
        now >= self.delay_until && self.visibility_until.map(|v| now >= v).unwrap_or(true)
    }

    pub fn sequence_number_str(&self) -> Option<String> {
        self.sequence_number.map(|n| format!("{n:020}"))
    }

    /// Mark as received: fresh receipt token, new visibility deadline, bumped
    /// receive count, first-received timestamp latched on the 0 -> 1 edge.
    pub fn mark_received(&mut self, visibility_until: Instant) -> String {
        let token = Uuid::new_v4().to_string();
        self.receipt_token = Some(token.clone());
        self.visibility_until = Some(visibility_until);
        self.receive_count += 1;
        if self.first_received_at_millis.is_none() {
            self.first_received_at_millis = Some(now_millis());
        }
        token
    }

    /// Reset to a freshly-admitted state (used by redrive, automatic and explicit).
    pub fn reset_for_redrive(&mut self, reset_receive_count: bool, now: Instant) {
        self.receipt_token = None;
        self.visibility_until = None;
        self.delay_until = now;
        if reset_receive_count {
            self.receive_count = 0;
        }
    }
}
