//! RiskExchange - per-character risk level queues
//!
//! One queue per character name. The broker's feed task is the only producer
//! for a queue and the crew actor running the heist is the only consumer.
//!
//! - Delivery order within a queue matches publish order (unbounded mpsc)
//! - Nothing is persisted: publishing with no attached consumer drops the level
//! - Attaching a new consumer replaces the previous one, whose inbox closes

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

/// A single risk level update travelling through a queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskSignal {
    pub character: String,
    pub level: u32,
    /// Per-queue publish sequence, starting at 1
    pub seq: u64,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RiskChannelError {
    #[error("no consumer attached to risk channel '{0}'")]
    NoConsumer(String),
}

struct RiskQueue {
    consumer_id: String,
    sender: mpsc::UnboundedSender<RiskSignal>,
    published: u64,
}

/// Receiving end handed to the consumer on attach
#[derive(Debug)]
pub struct RiskInbox {
    character: String,
    receiver: mpsc::UnboundedReceiver<RiskSignal>,
}

impl RiskInbox {
    pub fn character(&self) -> &str {
        &self.character
    }

    /// Next level, or `None` once the queue was torn down or replaced
    pub async fn recv(&mut self) -> Option<RiskSignal> {
        self.receiver.recv().await
    }
}

/// Shared registry of risk queues, cheap to clone
#[derive(Clone, Default)]
pub struct RiskExchange {
    queues: Arc<Mutex<HashMap<String, RiskQueue>>>,
}

impl RiskExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `consumer_id` as the sole consumer of `character`'s queue
    pub async fn attach(&self, character: &str, consumer_id: &str) -> RiskInbox {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut queues = self.queues.lock().await;
        if let Some(previous) = queues.insert(
            character.to_string(),
            RiskQueue {
                consumer_id: consumer_id.to_string(),
                sender,
                published: 0,
            },
        ) {
            tracing::debug!(
                character = %character,
                previous_consumer = %previous.consumer_id,
                consumer = %consumer_id,
                "Risk channel consumer replaced"
            );
        }

        tracing::debug!(character = %character, consumer = %consumer_id, "Risk channel attached");
        RiskInbox {
            character: character.to_string(),
            receiver,
        }
    }

    /// Detach the consumer, but only if it is still the attached one
    pub async fn detach(&self, character: &str, consumer_id: &str) -> bool {
        let mut queues = self.queues.lock().await;
        let owned = queues
            .get(character)
            .is_some_and(|queue| queue.consumer_id == consumer_id);
        if owned {
            queues.remove(character);
            tracing::debug!(
                character = %character,
                consumer = %consumer_id,
                "Risk channel detached"
            );
        }
        owned
    }

    /// Tear down a queue regardless of its consumer; the inbox sees `None`
    pub async fn close(&self, character: &str) -> bool {
        self.queues.lock().await.remove(character).is_some()
    }

    pub async fn has_consumer(&self, character: &str) -> bool {
        self.queues
            .lock()
            .await
            .get(character)
            .is_some_and(|queue| !queue.sender.is_closed())
    }

    /// Publish one level; returns the sequence number it was delivered with
    pub async fn publish(&self, character: &str, level: u32) -> Result<u64, RiskChannelError> {
        let mut queues = self.queues.lock().await;
        let Some(queue) = queues.get_mut(character) else {
            return Err(RiskChannelError::NoConsumer(character.to_string()));
        };

        let seq = queue.published + 1;
        let signal = RiskSignal {
            character: character.to_string(),
            level,
            seq,
        };
        if queue.sender.send(signal).is_ok() {
            queue.published = seq;
            return Ok(seq);
        }

        // Consumer dropped its inbox without detaching.
        queues.remove(character);
        Err(RiskChannelError::NoConsumer(character.to_string()))
    }
}
