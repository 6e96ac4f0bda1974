use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::traits::{Backend, OutgoingMessage, PulledMessage};
use crate::error::BackendError;

/// In-memory emulation of the pub/sub backend, for tests and local
/// development. Behaves like the real thing where the engine can observe it:
/// publish fans out to every subscription of the topic, a pulled message is
/// hidden behind an ack deadline and becomes pullable again once the
/// deadline passes, and redundant acknowledges are no-ops.
pub struct MemoryBackend {
    ack_deadline: Duration,
    next_id: AtomicU64,
    topics: Mutex<HashMap<String, TopicState>>,
}

#[derive(Default)]
struct TopicState {
    subscriptions: HashMap<String, SubscriptionState>,
}

#[derive(Default)]
struct SubscriptionState {
    pending: VecDeque<StoredMessage>,
    /// Pulled-but-unacknowledged messages keyed by ack id.
    outstanding: HashMap<String, Outstanding>,
}

#[derive(Clone)]
struct StoredMessage {
    message_id: String,
    data: String,
    attributes: HashMap<String, String>,
}

struct Outstanding {
    message: StoredMessage,
    deadline: Instant,
}

impl MemoryBackend {
    pub const DEFAULT_ACK_DEADLINE: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        Self::with_ack_deadline(Self::DEFAULT_ACK_DEADLINE)
    }

    pub fn with_ack_deadline(ack_deadline: Duration) -> Self {
        Self {
            ack_deadline,
            next_id: AtomicU64::new(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Move expired outstanding messages back to the pending queue so they
    /// are redeliverable, mirroring ack-deadline expiry on the real backend.
    fn reclaim_expired(subscription: &mut SubscriptionState, now: Instant) {
        let expired: Vec<String> = subscription
            .outstanding
            .iter()
            .filter(|(_, o)| o.deadline <= now)
            .map(|(ack_id, _)| ack_id.clone())
            .collect();
        for ack_id in expired {
            if let Some(outstanding) = subscription.outstanding.remove(&ack_id) {
                subscription.pending.push_back(outstanding.message);
            }
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn topic_exists(&self, topic: &str) -> Result<bool, BackendError> {
        Ok(self.topics.lock().unwrap().contains_key(topic))
    }

    async fn create_topic(&self, topic: &str) -> Result<(), BackendError> {
        // Idempotent: creating an existing topic is a no-op.
        self.topics
            .lock()
            .unwrap()
            .entry(topic.to_string())
            .or_default();
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        messages: Vec<OutgoingMessage>,
    ) -> Result<Vec<String>, BackendError> {
        let mut topics = self.topics.lock().unwrap();
        let state = topics
            .get_mut(topic)
            .ok_or_else(|| BackendError::NotFound(format!("topic {topic}")))?;

        let mut ids = Vec::with_capacity(messages.len());
        for message in messages {
            let message_id = format!("m{}", self.next_id());
            let stored = StoredMessage {
                message_id: message_id.clone(),
                data: message.data,
                attributes: message.attributes.into_iter().collect(),
            };
            for subscription in state.subscriptions.values_mut() {
                subscription.pending.push_back(stored.clone());
            }
            ids.push(message_id);
        }
        Ok(ids)
    }

    async fn subscription_exists(
        &self,
        topic: &str,
        subscription: &str,
    ) -> Result<bool, BackendError> {
        let topics = self.topics.lock().unwrap();
        Ok(topics
            .get(topic)
            .is_some_and(|t| t.subscriptions.contains_key(subscription)))
    }

    async fn create_subscription(
        &self,
        topic: &str,
        subscription: &str,
    ) -> Result<(), BackendError> {
        let mut topics = self.topics.lock().unwrap();
        let state = topics
            .get_mut(topic)
            .ok_or_else(|| BackendError::NotFound(format!("topic {topic}")))?;
        state
            .subscriptions
            .entry(subscription.to_string())
            .or_default();
        Ok(())
    }

    async fn pull(
        &self,
        topic: &str,
        subscription: &str,
        max_messages: usize,
    ) -> Result<Vec<PulledMessage>, BackendError> {
        let mut topics = self.topics.lock().unwrap();
        let state = topics
            .get_mut(topic)
            .ok_or_else(|| BackendError::NotFound(format!("topic {topic}")))?;
        let sub = state
            .subscriptions
            .get_mut(subscription)
            .ok_or_else(|| BackendError::NotFound(format!("subscription {subscription}")))?;

        let now = Instant::now();
        Self::reclaim_expired(sub, now);

        let mut pulled = Vec::new();
        while pulled.len() < max_messages {
            let Some(message) = sub.pending.pop_front() else {
                break;
            };
            let ack_id = format!("a{}", self.next_id());
            pulled.push(PulledMessage {
                ack_id: ack_id.clone(),
                message_id: message.message_id.clone(),
                data: message.data.clone(),
                attributes: message.attributes.clone(),
            });
            sub.outstanding.insert(
                ack_id,
                Outstanding {
                    message,
                    deadline: now + self.ack_deadline,
                },
            );
        }
        Ok(pulled)
    }

    async fn acknowledge(
        &self,
        topic: &str,
        subscription: &str,
        ack_id: &str,
    ) -> Result<(), BackendError> {
        let mut topics = self.topics.lock().unwrap();
        let state = topics
            .get_mut(topic)
            .ok_or_else(|| BackendError::NotFound(format!("topic {topic}")))?;
        let sub = state
            .subscriptions
            .get_mut(subscription)
            .ok_or_else(|| BackendError::NotFound(format!("subscription {subscription}")))?;

        // Unknown or already-acked ids are tolerated: the deadline may have
        // expired and the message may already be back in flight elsewhere.
        sub.outstanding.remove(ack_id);
        Ok(())
    }

    async fn modify_ack_deadline(
        &self,
        topic: &str,
        subscription: &str,
        ack_id: &str,
        seconds: u64,
    ) -> Result<(), BackendError> {
        let mut topics = self.topics.lock().unwrap();
        let state = topics
            .get_mut(topic)
            .ok_or_else(|| BackendError::NotFound(format!("topic {topic}")))?;
        let sub = state
            .subscriptions
            .get_mut(subscription)
            .ok_or_else(|| BackendError::NotFound(format!("subscription {subscription}")))?;

        if let Some(outstanding) = sub.outstanding.get_mut(ack_id) {
            outstanding.deadline = Instant::now() + Duration::from_secs(seconds);
        }
        Ok(())
    }
}
