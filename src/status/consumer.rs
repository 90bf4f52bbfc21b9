//! Background consumer for the status channel.
//!
//! Long-polls the status queue, projects each event into the cache and
//! only then deletes the message, so a crash mid-processing causes
//! redelivery rather than loss. The cache update is last-write-wins, so
//! redelivered events are harmless.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::queue::MessageQueue;
use crate::status::cache::StatusCache;
use crate::status::event::StatusEvent;

/// Long-poll wait per receive call.
pub const POLL_WAIT: Duration = Duration::from_secs(20);
/// How long a received message stays hidden from other consumers. Must
/// exceed the time needed to project one event into the cache.
pub const VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);
/// A message that fails to parse this many times is dropped with an error
/// log instead of being redelivered forever.
pub const POISON_MAX_RECEIVES: u32 = 5;

pub struct StatusConsumer {
    queue: Arc<dyn MessageQueue>,
    cache: StatusCache,
    shutdown: watch::Receiver<bool>,
}

impl StatusConsumer {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        cache: StatusCache,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            cache,
            shutdown,
        }
    }

    /// Poll until shutdown is signalled. In-flight message processing
    /// finishes before the loop exits; anything not yet deleted is
    /// redelivered to the next consumer.
    pub async fn run(mut self) {
        tracing::info!("status consumer started");
        loop {
            let batch = tokio::select! {
                _ = self.shutdown.changed() => break,
                received = self.queue.receive(1, POLL_WAIT, VISIBILITY_TIMEOUT) => received,
            };

            let messages = match batch {
                Ok(messages) => messages,
                Err(err) => {
                    tracing::error!("status queue receive failed: {}", err);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            for message in messages {
                self.process(&message.body, &message.receipt_handle, message.receive_count)
                    .await;
            }

            if *self.shutdown.borrow() {
                break;
            }
        }
        tracing::info!("status consumer stopped");
    }

    async fn process(&self, body: &str, receipt_handle: &str, receive_count: u32) {
        let event = match StatusEvent::from_json(body) {
            Ok(event) => event,
            Err(err) => {
                if receive_count >= POISON_MAX_RECEIVES {
                    tracing::error!(
                        "dropping poison status message after {} receives: {}",
                        receive_count,
                        err
                    );
                    if let Err(del_err) = self.queue.delete(receipt_handle).await {
                        tracing::error!("failed to drop poison message: {}", del_err);
                    }
                } else {
                    // Leave it on the queue; the visibility timeout will
                    // redeliver it.
                    tracing::warn!("malformed status message (receive {}): {}", receive_count, err);
                }
                return;
            }
        };

        if let Err(err) = self.cache.apply(&event).await {
            tracing::error!("failed to update status cache for {}: {}", event.doc_id, err);
            return;
        }

        tracing::info!(
            "status for document {} updated to {}",
            event.doc_id,
            event.status.as_str()
        );

        if let Err(err) = self.queue.delete(receipt_handle).await {
            // The event is already applied; redelivery will be a no-op.
            tracing::warn!("failed to delete processed status message: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryQueue;
    use crate::status::event::StatusEvent;

    async fn drain_once(queue: &Arc<InMemoryQueue>, cache: &StatusCache) {
        let (_tx, rx) = watch::channel(false);
        let consumer = StatusConsumer::new(
            Arc::clone(queue) as Arc<dyn MessageQueue>,
            cache.clone(),
            rx,
        );
        let messages = queue
            .receive(10, Duration::ZERO, Duration::from_secs(30))
            .await
            .unwrap();
        for m in messages {
            consumer.process(&m.body, &m.receipt_handle, m.receive_count).await;
        }
    }

    #[tokio::test]
    async fn event_is_projected_and_message_deleted() {
        let queue = Arc::new(InMemoryQueue::new());
        let cache = StatusCache::in_memory().await.unwrap();

        queue
            .send(&StatusEvent::failed("d1", "Failed processing file").to_json())
            .await
            .unwrap();
        drain_once(&queue, &cache).await;

        let entry = cache.get("d1").await.unwrap().unwrap();
        assert_eq!(entry.status, "failed");
        assert_eq!(entry.desc.as_deref(), Some("Failed processing file"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn redelivered_event_leaves_cache_unchanged() {
        let queue = Arc::new(InMemoryQueue::new());
        let cache = StatusCache::in_memory().await.unwrap();
        let body = StatusEvent::failed("d1", "x").to_json();

        queue.send(&body).await.unwrap();
        queue.send(&body).await.unwrap();
        drain_once(&queue, &cache).await;

        let entries = cache.all().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].desc.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn malformed_message_is_left_for_redelivery_until_poison_limit() {
        let queue = Arc::new(InMemoryQueue::new());
        let cache = StatusCache::in_memory().await.unwrap();

        queue.send("not json").await.unwrap();

        // Below the limit: message survives.
        drain_once(&queue, &cache).await;
        assert_eq!(queue.len(), 1);

        let (_tx, rx) = watch::channel(false);
        let consumer = StatusConsumer::new(
            Arc::clone(&queue) as Arc<dyn MessageQueue>,
            cache.clone(),
            rx,
        );
        // At the limit: message is dropped.
        consumer.process("not json", "0#1", POISON_MAX_RECEIVES).await;
        // The handle above matches the first receive, so the queue drains.
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let queue = Arc::new(InMemoryQueue::new());
        let cache = StatusCache::in_memory().await.unwrap();
        let (tx, rx) = watch::channel(false);

        let consumer = StatusConsumer::new(Arc::clone(&queue) as Arc<dyn MessageQueue>, cache, rx);
        let handle = tokio::spawn(consumer.run());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("consumer did not stop on shutdown")
            .unwrap();
    }
}
