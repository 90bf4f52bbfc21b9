//! Message-queue abstraction.
//!
//! At-least-once delivery: a received message stays on the queue (made
//! invisible for the visibility timeout) until explicitly deleted, so a
//! consumer crash before deletion causes redelivery. Consumers must treat
//! every side effect as repeatable.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::errors::QueueError;

/// One received message. `receipt_handle` is only valid while the message
/// is invisible; `receive_count` counts deliveries of this message so far.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub body: String,
    pub receipt_handle: String,
    pub receive_count: u32,
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn send(&self, body: &str) -> Result<(), QueueError>;

    /// Long-poll for up to `wait`, returning at most `max_messages`
    /// messages and hiding them for `visibility`.
    async fn receive(
        &self,
        max_messages: u32,
        wait: Duration,
        visibility: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}

struct StoredMessage {
    id: u64,
    body: String,
    receive_count: u32,
    invisible_until: Option<Instant>,
    receipt_handle: Option<String>,
}

/// In-process queue with real visibility-timeout semantics, used by tests
/// and local development in place of SQS.
pub struct InMemoryQueue {
    inner: Mutex<Inner>,
}

struct Inner {
    messages: VecDeque<StoredMessage>,
    next_id: u64,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                messages: VecDeque::new(),
                next_id: 0,
            }),
        }
    }

    /// Number of messages still on the queue (visible or not).
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn try_receive(
        &self,
        max_messages: u32,
        visibility: Duration,
    ) -> Vec<QueueMessage> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let mut received = Vec::new();

        for msg in inner.messages.iter_mut() {
            if received.len() as u32 >= max_messages {
                break;
            }
            let visible = msg.invisible_until.map_or(true, |t| t <= now);
            if !visible {
                continue;
            }

            msg.receive_count += 1;
            msg.invisible_until = Some(now + visibility);
            let handle = format!("{}#{}", msg.id, msg.receive_count);
            msg.receipt_handle = Some(handle.clone());

            received.push(QueueMessage {
                body: msg.body.clone(),
                receipt_handle: handle,
                receive_count: msg.receive_count,
            });
        }

        received
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn send(&self, body: &str) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.messages.push_back(StoredMessage {
            id,
            body: body.to_string(),
            receive_count: 0,
            invisible_until: None,
            receipt_handle: None,
        });
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: u32,
        wait: Duration,
        visibility: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            let received = self.try_receive(max_messages, visibility);
            if !received.is_empty() || Instant::now() >= deadline {
                return Ok(received);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .messages
            .retain(|m| m.receipt_handle.as_deref() != Some(receipt_handle));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn received_message_is_invisible_until_timeout() {
        let queue = InMemoryQueue::new();
        queue.send("m1").await.unwrap();

        let first = queue
            .receive(1, Duration::ZERO, Duration::from_millis(30))
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].receive_count, 1);

        // Still hidden.
        let hidden = queue
            .receive(1, Duration::ZERO, Duration::from_millis(30))
            .await
            .unwrap();
        assert!(hidden.is_empty());

        // Redelivered after the visibility timeout elapses.
        tokio::time::sleep(Duration::from_millis(40)).await;
        let again = queue
            .receive(1, Duration::ZERO, Duration::from_millis(30))
            .await
            .unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].receive_count, 2);
    }

    #[tokio::test]
    async fn delete_removes_message_permanently() {
        let queue = InMemoryQueue::new();
        queue.send("m1").await.unwrap();

        let msgs = queue
            .receive(1, Duration::ZERO, Duration::from_millis(10))
            .await
            .unwrap();
        queue.delete(&msgs[0].receipt_handle).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let after = queue
            .receive(1, Duration::ZERO, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(after.is_empty());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn receive_waits_for_late_send() {
        let queue = std::sync::Arc::new(InMemoryQueue::new());
        let sender = std::sync::Arc::clone(&queue);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            sender.send("late").await.unwrap();
        });

        let msgs = queue
            .receive(1, Duration::from_millis(200), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].body, "late");
    }
}
