use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use serde_json::Value;

use super::error::SqsError;
use super::message::{md5_hex, now_secs, Message, MessageAttributeValue};

const DEDUP_WINDOW: Duration = Duration::from_secs(300);

/// `{deadLetterTargetArn, maxReceiveCount}`, decoded from the `RedrivePolicy`
/// attribute's embedded JSON string.
#[derive(Debug, Clone)]
pub struct RedrivePolicy {
    pub dead_letter_target_arn: String,
    pub max_receive_count: u32,
}

impl RedrivePolicy {
    pub fn from_json(s: &str) -> Result<Self, SqsError> {
        let v: Value = serde_json::from_str(s).map_err(|e| {
            SqsError::InvalidParameterValue(format!("RedrivePolicy is not valid JSON: {e}"))
        })?;
        let dead_letter_target_arn = v
            .get("deadLetterTargetArn")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SqsError::InvalidParameterValue(
                    "RedrivePolicy must contain deadLetterTargetArn".into(),
                )
            })?
            .to_string();
        let max_receive_count = v
            .get("maxReceiveCount")
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .ok_or_else(|| {
                SqsError::InvalidParameterValue(
                    "RedrivePolicy must contain maxReceiveCount".into(),
                )
            })? as u32;
        Ok(RedrivePolicy {
            dead_letter_target_arn,
            max_receive_count,
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({
            "deadLetterTargetArn": self.dead_letter_target_arn,
            "maxReceiveCount": self.max_receive_count,
        })
        .to_string()
    }

    /// The bare queue name this policy's target ARN resolves to.
    pub fn target_name(&self) -> &str {
        self.dead_letter_target_arn
            .rsplit(':')
            .next()
            .unwrap_or(&self.dead_letter_target_arn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrivePermission {
    AllowAll,
    DenyAll,
    ByQueue,
}

#[derive(Debug, Clone)]
pub struct RedriveAllowPolicy {
    pub permission: RedrivePermission,
    pub source_queue_arns: Vec<String>,
}

impl RedriveAllowPolicy {
    pub fn from_json(s: &str) -> Result<Self, SqsError> {
        let v: Value = serde_json::from_str(s).map_err(|e| {
            SqsError::InvalidParameterValue(format!("RedriveAllowPolicy is not valid JSON: {e}"))
        })?;
        let permission = match v.get("redrivePermission").and_then(Value::as_str) {
            Some("denyAll") => RedrivePermission::DenyAll,
            Some("byQueue") => RedrivePermission::ByQueue,
            _ => RedrivePermission::AllowAll,
        };
        let source_queue_arns = v
            .get("sourceQueueArns")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        Ok(RedriveAllowPolicy {
            permission,
            source_queue_arns,
        })
    }

    pub fn to_json(&self) -> String {
        let permission = match self.permission {
            RedrivePermission::AllowAll => "allowAll",
            RedrivePermission::DenyAll => "denyAll",
            RedrivePermission::ByQueue => "byQueue",
        };
        serde_json::json!({
            "redrivePermission": permission,
            "sourceQueueArns": self.source_queue_arns,
        })
        .to_string()
    }
}

/// A queue's configured, mutable settings (everything `GetAttributes` reports
/// besides the computed counts and the ARN/timestamps `Queue` tracks itself).
#[derive(Debug, Clone)]
pub struct QueueAttributes {
    pub visibility_timeout_secs: u32,
    pub message_retention_secs: u32,
    pub maximum_message_size: u32,
    pub delay_seconds: u32,
    pub receive_wait_time_secs: u32,
    pub max_receive_count: Option<u32>,
    pub fifo_queue: bool,
    pub content_based_dedup: bool,
    pub redrive_policy: Option<RedrivePolicy>,
    pub redrive_allow_policy: Option<RedriveAllowPolicy>,
    /// Attribute names this core doesn't interpret, retained verbatim so
    /// compatible SDKs still see them echoed back by `GetAttributes`.
    pub extra: HashMap<String, String>,
}

impl Default for QueueAttributes {
    fn default() -> Self {
        QueueAttributes {
            visibility_timeout_secs: 30,
            message_retention_secs: 345_600,
            maximum_message_size: 262_144,
            delay_seconds: 0,
            receive_wait_time_secs: 0,
            max_receive_count: None,
            fifo_queue: false,
            content_based_dedup: false,
            redrive_policy: None,
            redrive_allow_policy: None,
            extra: HashMap::new(),
        }
    }
}

impl QueueAttributes {
    pub fn apply(&mut self, attrs: &HashMap<String, String>) -> Result<(), SqsError> {
        for (key, value) in attrs {
            match key.as_str() {
                "VisibilityTimeout" => self.visibility_timeout_secs = parse_u32(key, value)?,
                "MessageRetentionPeriod" => self.message_retention_secs = parse_u32(key, value)?,
                "MaximumMessageSize" => self.maximum_message_size = parse_u32(key, value)?,
                "DelaySeconds" => self.delay_seconds = parse_u32(key, value)?,
                "ReceiveMessageWaitTimeSeconds" => {
                    self.receive_wait_time_secs = parse_u32(key, value)?
                }
                "MaxReceiveCount" => self.max_receive_count = Some(parse_u32(key, value)?),
                "FifoQueue" => self.fifo_queue = value == "true",
                "ContentBasedDeduplication" => self.content_based_dedup = value == "true",
                "RedrivePolicy" => {
                    self.redrive_policy = if value.is_empty() {
                        None
                    } else {
                        Some(RedrivePolicy::from_json(value)?)
                    };
                }
                "RedriveAllowPolicy" => {
                    self.redrive_allow_policy = if value.is_empty() {
                        None
                    } else {
                        Some(RedriveAllowPolicy::from_json(value)?)
                    };
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        let mut m = self.extra.clone();
        m.insert("VisibilityTimeout".into(), self.visibility_timeout_secs.to_string());
        m.insert("MessageRetentionPeriod".into(), self.message_retention_secs.to_string());
        m.insert("MaximumMessageSize".into(), self.maximum_message_size.to_string());
        m.insert("DelaySeconds".into(), self.delay_seconds.to_string());
        m.insert(
            "ReceiveMessageWaitTimeSeconds".into(),
            self.receive_wait_time_secs.to_string(),
        );
        if let Some(max) = self.max_receive_count {
            m.insert("MaxReceiveCount".into(), max.to_string());
        }
        m.insert("FifoQueue".into(), self.fifo_queue.to_string());
        if self.fifo_queue {
            m.insert(
                "ContentBasedDeduplication".into(),
                self.content_based_dedup.to_string(),
            );
        }
        if let Some(ref rp) = self.redrive_policy {
            m.insert("RedrivePolicy".into(), rp.to_json());
        }
        if let Some(ref rap) = self.redrive_allow_policy {
            m.insert("RedriveAllowPolicy".into(), rap.to_json());
        }
        m
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, SqsError> {
    value
        .parse()
        .map_err(|_| SqsError::InvalidParameterValue(format!("Invalid value for {key}: {value}")))
}

/// A message handed to another queue's tail by an automatic DLQ move.
pub struct DlqRedrive {
    pub message: Message,
    pub target_arn: String,
}

/// One queue's messages, configuration, dedup cache and sequence counter.
/// Every method here assumes the caller already holds the right lock
/// (exclusive for the mutators, shared for `get_attributes`/`approximate_*`) —
/// `Queue` itself performs no locking; that's the registry's job.
pub struct Queue {
    pub name: String,
    pub arn: String,
    pub attributes: QueueAttributes,
    pub created_at: u64,
    pub last_modified: u64,
    messages: VecDeque<Message>,
    inflight: HashMap<String, Message>,
    dedup_cache: HashMap<String, (String, Option<u64>, Instant)>,
    sequence_counter: u64,
    locked_groups: HashSet<String>,
}

pub struct SendOutcome {
    pub message_id: String,
    pub md5_of_body: String,
    pub sequence_number: Option<String>,
}

pub struct ReceivedMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    pub md5_of_body: String,
    pub attributes: HashMap<String, String>,
    pub message_attributes: HashMap<String, MessageAttributeValue>,
}

impl Queue {
    pub fn new(name: String, arn: String, attributes: QueueAttributes) -> Self {
        let now = now_secs();
        Queue {
            name,
            arn,
            attributes,
            created_at: now,
            last_modified: now,
            messages: VecDeque::new(),
            inflight: HashMap::new(),
            dedup_cache: HashMap::new(),
            sequence_counter: 0,
            locked_groups: HashSet::new(),
        }
    }

    fn clean_dedup_cache(&mut self) {
        self.dedup_cache.retain(|_, (_, _, ts)| ts.elapsed() < DEDUP_WINDOW);
    }

    pub fn send(
        &mut self,
        body: String,
        attributes: HashMap<String, MessageAttributeValue>,
        delay_seconds: Option<u32>,
        mut dedup_id: Option<String>,
        group_id: Option<String>,
        sender_id: &str,
    ) -> Result<SendOutcome, SqsError> {
        if body.is_empty() {
            return Err(SqsError::InvalidParameterValue(
                "message body must not be empty".into(),
            ));
        }
        if body.len() > self.attributes.maximum_message_size as usize {
            return Err(SqsError::InvalidParameterValue(format!(
                "message body must be shorter than {} bytes",
                self.attributes.maximum_message_size
            )));
        }
        if self.attributes.fifo_queue && group_id.is_none() {
            return Err(SqsError::MissingParameter(
                "MessageGroupId is required for ordered-mode queues".into(),
            ));
        }
        if self.attributes.fifo_queue && dedup_id.is_none() {
            if self.attributes.content_based_dedup {
                dedup_id = Some(md5_hex(body.as_bytes()));
            } else {
                return Err(SqsError::MissingParameter(
                    "MessageDeduplicationId is required without ContentBasedDeduplication".into(),
                ));
            }
        }

        self.clean_dedup_cache();
        if self.attributes.fifo_queue {
            if let Some(ref dedup) = dedup_id {
                if let Some((message_id, sequence_number, ts)) = self.dedup_cache.get(dedup) {
                    if ts.elapsed() < DEDUP_WINDOW {
                        return Ok(SendOutcome {
                            message_id: message_id.clone(),
                            md5_of_body: md5_hex(body.as_bytes()),
                            sequence_number: sequence_number.map(|n| format!("{n:020}")),
                        });
                    }
                }
            }
        }

        let delay = delay_seconds.unwrap_or(self.attributes.delay_seconds);
        let sequence_number = if self.attributes.fifo_queue {
            self.sequence_counter += 1;
            Some(self.sequence_counter)
        } else {
            None
        };

        let message = Message::new(
            body,
            attributes,
            dedup_id.clone(),
            group_id,
            sequence_number,
            Instant::now() + Duration::from_secs(delay as u64),
            sender_id.to_string(),
        );

        let outcome = SendOutcome {
            message_id: message.id.clone(),
            md5_of_body: message.md5_of_body.clone(),
            sequence_number: message.sequence_number_str(),
        };

        if let Some(dedup) = dedup_id {
            self.dedup_cache.insert(
                dedup,
                (message.id.clone(), message.sequence_number, Instant::now()),
            );
        }
        self.messages.push_back(message);
        Ok(outcome)
    }

    pub fn receive(
        &mut self,
        max_count: u32,
        visibility_timeout_secs: u32,
        sender_id: &str,
    ) -> Vec<ReceivedMessage> {
        let now = Instant::now();
        let max_count = max_count.max(1) as usize;

        let selected: Vec<usize> = if self.attributes.fifo_queue {
            let mut seen_groups: HashSet<String> = HashSet::new();
            self.messages
                .iter()
                .enumerate()
                .filter(|(_, m)| m.is_eligible(now))
                .filter(|(_, m)| {
                    let gid = m.group_id.clone().unwrap_or_default();
                    if self.locked_groups.contains(&gid) || seen_groups.contains(&gid) {
                        false
                    } else {
                        seen_groups.insert(gid);
                        true
                    }
                })
                .take(max_count)
                .map(|(i, _)| i)
                .collect()
        } else {
            self.messages
                .iter()
                .enumerate()
                .filter(|(_, m)| m.is_eligible(now))
                .take(max_count)
                .map(|(i, _)| i)
                .collect()
        };

        let selected: HashSet<usize> = selected.into_iter().collect();
        let mut remaining = VecDeque::with_capacity(self.messages.len());
        let mut results = Vec::with_capacity(selected.len());
        let visibility_until = now + Duration::from_secs(visibility_timeout_secs as u64);

        for (i, mut message) in std::mem::take(&mut self.messages).into_iter().enumerate() {
            if !selected.contains(&i) {
                remaining.push_back(message);
                continue;
            }
            let receipt_handle = message.mark_received(visibility_until);
            if let Some(ref gid) = message.group_id {
                self.locked_groups.insert(gid.clone());
            }

            let mut system_attrs = HashMap::new();
            system_attrs.insert("SenderId".into(), sender_id.to_string());
            system_attrs.insert("SentTimestamp".into(), message.sent_at_millis.to_string());
            system_attrs.insert("ApproximateReceiveCount".into(), message.receive_count.to_string());
            system_attrs.insert(
                "ApproximateFirstReceiveTimestamp".into(),
                message.first_received_at_millis.unwrap_or_default().to_string(),
            );
            if let Some(ref gid) = message.group_id {
                system_attrs.insert("MessageGroupId".into(), gid.clone());
            }
            if let Some(ref dedup) = message.dedup_id {
                system_attrs.insert("MessageDeduplicationId".into(), dedup.clone());
            }
            if let Some(seq) = message.sequence_number_str() {
                system_attrs.insert("SequenceNumber".into(), seq);
            }

            results.push(ReceivedMessage {
                message_id: message.id.clone(),
                receipt_handle: receipt_handle.clone(),
                body: message.body.clone(),
                md5_of_body: message.md5_of_body.clone(),
                attributes: system_attrs,
                message_attributes: message.attributes.clone(),
            });

            self.inflight.insert(receipt_handle, message);
        }
        self.messages = remaining;
        results
    }

    pub fn delete(&mut self, receipt_handle: &str) -> bool {
        if let Some(message) = self.inflight.remove(receipt_handle) {
            if let Some(ref gid) = message.group_id {
                self.locked_groups.remove(gid);
            }
            true
        } else {
            false
        }
    }

    pub fn purge(&mut self) {
        self.messages.clear();
        self.inflight.clear();
        self.locked_groups.clear();
        self.dedup_cache.clear();
        self.last_modified = now_secs();
    }

    pub fn set_attributes(&mut self, attrs: &HashMap<String, String>) -> Result<(), SqsError> {
        if attrs.contains_key("FifoQueue") {
            return Err(SqsError::InvalidParameterValue(
                "FifoQueue cannot be changed after creation".into(),
            ));
        }
        self.attributes.apply(attrs)?;
        self.last_modified = now_secs();
        Ok(())
    }

    pub fn get_attributes(&self) -> HashMap<String, String> {
        let mut m = self.attributes.to_map();
        m.insert("QueueArn".into(), self.arn.clone());
        m.insert("CreatedTimestamp".into(), self.created_at.to_string());
        m.insert("LastModifiedTimestamp".into(), self.last_modified.to_string());
        m.insert(
            "ApproximateNumberOfMessages".into(),
            self.approximate_visible().to_string(),
        );
        m.insert(
            "ApproximateNumberOfMessagesNotVisible".into(),
            self.inflight.len().to_string(),
        );
        m.insert(
            "ApproximateNumberOfMessagesDelayed".into(),
            self.approximate_delayed().to_string(),
        );
        m
    }

    pub fn approximate_visible(&self) -> usize {
        let now = Instant::now();
        self.messages.iter().filter(|m| now >= m.delay_until).count()
    }

    pub fn approximate_delayed(&self) -> usize {
        let now = Instant::now();
        self.messages.iter().filter(|m| now < m.delay_until).count()
    }

    pub fn approximate_total(&self) -> usize {
        self.messages.len() + self.inflight.len()
    }

    /// Scans in-flight messages for ones whose visibility has lapsed. Those
    /// past their dead-letter policy's receive-count limit are pulled out for
    /// the caller to redirect; the rest simply rejoin the visible queue.
    /// Called both by the 1s background timer and opportunistically before
    /// each `Receive` selection attempt.
    pub fn expire_and_redrive(&mut self) -> Vec<DlqRedrive> {
        let now = Instant::now();
        let expired_tokens: Vec<String> = self
            .inflight
            .iter()
            .filter(|(_, m)| m.visibility_until.map(|v| now >= v).unwrap_or(false))
            .map(|(token, _)| token.clone())
            .collect();

        let mut redrives = Vec::new();
        for token in expired_tokens {
            let mut message = match self.inflight.remove(&token) {
                Some(m) => m,
                None => continue,
            };
            if let Some(ref gid) = message.group_id {
                self.locked_groups.remove(gid);
            }

            let over_limit = self
                .attributes
                .redrive_policy
                .as_ref()
                .map(|rp| message.receive_count >= rp.max_receive_count)
                .unwrap_or(false);

            if over_limit {
                let target_arn = self
                    .attributes
                    .redrive_policy
                    .as_ref()
                    .unwrap()
                    .dead_letter_target_arn
                    .clone();
                message.reset_for_redrive(false, now);
                redrives.push(DlqRedrive { message, target_arn });
            } else {
                message.reset_for_redrive(false, now);
                self.messages.push_back(message);
            }
        }
        redrives
    }

    /// Pops up to `cap` messages off the head for an explicit redrive; resets
    /// each as if freshly admitted, including the receive count.
    pub fn take_for_redrive(&mut self, cap: usize) -> Vec<Message> {
        let now = Instant::now();
        let mut moved = Vec::new();
        while moved.len() < cap {
            match self.messages.pop_front() {
                Some(mut message) => {
                    message.reset_for_redrive(true, now);
                    moved.push(message);
                }
                None => break,
            }
        }
        moved
    }

    pub fn append_redriven(&mut self, message: Message) {
        self.messages.push_back(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn standard_queue() -> Queue {
        Queue::new(
            "q".into(),
            "arn:aws:sqs:us-east-1:000000000000:q".into(),
            QueueAttributes::default(),
        )
    }

    fn fifo_queue(name: &str) -> Queue {
        let mut attrs = QueueAttributes::default();
        attrs.fifo_queue = true;
        attrs.content_based_dedup = true;
        Queue::new(name.into(), format!("arn:aws:sqs:us-east-1:000000000000:{name}"), attrs)
    }

    #[test]
    fn basic_lifecycle() {
        let mut q = standard_queue();
        let outcome = q
            .send("hello".into(), HashMap::new(), None, None, None, "sender")
            .unwrap();
        assert_eq!(outcome.md5_of_body, "5d41402abc4b2a76b9719d911017c592");

        let received = q.receive(1, 30, "sender");
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].body, "hello");

        assert!(q.delete(&received[0].receipt_handle));
        assert!(q.receive(1, 30, "sender").is_empty());
    }

    #[test]
    fn delete_is_exactly_once() {
        let mut q = standard_queue();
        q.send("x".into(), HashMap::new(), None, None, None, "sender").unwrap();
        let received = q.receive(1, 30, "sender");
        let handle = received[0].receipt_handle.clone();
        assert!(q.delete(&handle));
        assert!(!q.delete(&handle));
    }

    #[test]
    fn delay_seconds_postpones_visibility() {
        let mut q = standard_queue();
        q.send("later".into(), HashMap::new(), Some(1), None, None, "sender")
            .unwrap();
        assert!(q.receive(1, 30, "sender").is_empty());
        sleep(Duration::from_millis(1100));
        assert_eq!(q.receive(1, 30, "sender").len(), 1);
    }

    #[test]
    fn visibility_timeout_hides_in_flight_message() {
        let mut q = standard_queue();
        q.send("x".into(), HashMap::new(), None, None, None, "sender").unwrap();
        let first = q.receive(1, 1, "sender");
        assert_eq!(first.len(), 1);
        assert!(q.receive(1, 1, "sender").is_empty());
        sleep(Duration::from_millis(1100));
        // a background timer tick (or the opportunistic check inside
        // `receive_with_long_poll`) is what moves an expired in-flight
        // message back onto the visible sequence.
        q.expire_and_redrive();
        assert_eq!(q.receive(1, 1, "sender").len(), 1);
    }

    #[test]
    fn fifo_delivers_one_message_per_group_in_order() {
        let mut q = fifo_queue("q.fifo");
        for body in ["A1", "A2", "A3"] {
            q.send(body.into(), HashMap::new(), None, None, Some("gA".into()), "sender")
                .unwrap();
        }

        let first = q.receive(10, 30, "sender");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].body, "A1");
        assert!(q.delete(&first[0].receipt_handle));

        let second = q.receive(10, 30, "sender");
        assert_eq!(second[0].body, "A2");
        assert!(q.delete(&second[0].receipt_handle));

        let third = q.receive(10, 30, "sender");
        assert_eq!(third[0].body, "A3");
    }

    #[test]
    fn fifo_content_based_dedup_collapses_repeat_sends() {
        let mut q = fifo_queue("q.fifo");
        let first = q
            .send("same".into(), HashMap::new(), None, None, Some("g".into()), "sender")
            .unwrap();
        let second = q
            .send("same".into(), HashMap::new(), None, None, Some("g".into()), "sender")
            .unwrap();
        assert_eq!(first.message_id, second.message_id);
        assert_eq!(first.sequence_number, second.sequence_number);
        assert_eq!(q.approximate_total(), 1);
    }

    #[test]
    fn sequence_numbers_strictly_increase() {
        let mut q = fifo_queue("q.fifo");
        let a = q
            .send("a".into(), HashMap::new(), None, None, Some("g".into()), "sender")
            .unwrap();
        let b = q
            .send("b".into(), HashMap::new(), None, None, Some("g".into()), "sender")
            .unwrap();
        let seq_a: u64 = a.sequence_number.unwrap().parse().unwrap();
        let seq_b: u64 = b.sequence_number.unwrap().parse().unwrap();
        assert!(seq_b > seq_a);
    }

    #[test]
    fn dlq_trigger_after_max_receive_count() {
        let mut q = standard_queue();
        q.attributes.redrive_policy = Some(RedrivePolicy {
            dead_letter_target_arn: "arn:aws:sqs:us-east-1:000000000000:dlq".into(),
            max_receive_count: 3,
        });
        q.send("poison".into(), HashMap::new(), None, None, None, "sender").unwrap();

        for attempt in 0..3 {
            let received = q.receive(1, 1, "sender");
            assert_eq!(received.len(), 1, "attempt {attempt} should still see the message");
            sleep(Duration::from_millis(1100));
            if attempt < 2 {
                q.expire_and_redrive();
            }
        }

        let redrives = q.expire_and_redrive();
        assert_eq!(redrives.len(), 1);
        assert_eq!(redrives[0].message.body, "poison");
        assert_eq!(redrives[0].target_arn, "arn:aws:sqs:us-east-1:000000000000:dlq");
        assert!(q.receive(1, 30, "sender").is_empty());
    }

    #[test]
    fn explicit_redrive_resets_receive_count() {
        // The message lands in the dead-letter queue with a nonzero receive
        // count, as `expire_and_redrive` would have left it there.
        let mut dlq = standard_queue();
        let outcome = dlq
            .send("poison".into(), HashMap::new(), None, None, None, "sender")
            .unwrap();
        {
            let message = dlq.messages.front_mut().unwrap();
            message.receive_count = 3;
        }
        assert_eq!(dlq.messages.front().unwrap().id, outcome.message_id);

        let moved = dlq.take_for_redrive(10);
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].receive_count, 0);
        assert!(moved[0].is_eligible(Instant::now()));
    }

    #[test]
    fn purge_drops_all_messages() {
        let mut q = standard_queue();
        q.send("a".into(), HashMap::new(), None, None, None, "sender").unwrap();
        q.send("b".into(), HashMap::new(), None, None, None, "sender").unwrap();
        q.purge();
        assert_eq!(q.approximate_total(), 0);
    }

    #[test]
    fn unknown_attributes_are_retained_verbatim() {
        let mut attrs = QueueAttributes::default();
        let mut extra = HashMap::new();
        extra.insert("Policy".to_string(), "{}".to_string());
        attrs.apply(&extra).unwrap();
        assert_eq!(attrs.to_map().get("Policy"), Some(&"{}".to_string()));
    }
}
