use super::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{OutgoingMessage, PulledMessage};
use crate::error::BackendError;

/// Short ack deadline so redelivery tests don't stall.
pub(super) const TEST_ACK_DEADLINE: Duration = Duration::from_millis(50);

pub(super) fn test_queue() -> WorkQueue {
    test_queue_with(ConnectionConfig::default())
}

pub(super) fn test_queue_with(config: ConnectionConfig) -> WorkQueue {
    let backend = Arc::new(MemoryBackend::with_ack_deadline(TEST_ACK_DEADLINE));
    WorkQueue::new(backend, config)
}

/// Backend wrapper that records every call and can be armed to fail the
/// next publish, for asserting "no network call happened" and for the
/// ack-then-publish partial-failure scenario.
pub(super) struct ProbeBackend {
    inner: MemoryBackend,
    pub(super) calls: Mutex<Vec<&'static str>>,
    pub(super) fail_publish: AtomicBool,
}

impl ProbeBackend {
    pub(super) fn new() -> Self {
        Self {
            inner: MemoryBackend::with_ack_deadline(TEST_ACK_DEADLINE),
            calls: Mutex::new(Vec::new()),
            fail_publish: AtomicBool::new(false),
        }
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    pub(super) fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|&&c| c == call).count()
    }
}

#[async_trait]
impl Backend for ProbeBackend {
    async fn topic_exists(&self, topic: &str) -> Result<bool, BackendError> {
        self.record("topic_exists");
        self.inner.topic_exists(topic).await
    }

    async fn create_topic(&self, topic: &str) -> Result<(), BackendError> {
        self.record("create_topic");
        self.inner.create_topic(topic).await
    }

    async fn publish(
        &self,
        topic: &str,
        messages: Vec<OutgoingMessage>,
    ) -> Result<Vec<String>, BackendError> {
        self.record("publish");
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("injected publish failure".to_string()));
        }
        self.inner.publish(topic, messages).await
    }

    async fn subscription_exists(
        &self,
        topic: &str,
        subscription: &str,
    ) -> Result<bool, BackendError> {
        self.record("subscription_exists");
        self.inner.subscription_exists(topic, subscription).await
    }

    async fn create_subscription(
        &self,
        topic: &str,
        subscription: &str,
    ) -> Result<(), BackendError> {
        self.record("create_subscription");
        self.inner.create_subscription(topic, subscription).await
    }

    async fn pull(
        &self,
        topic: &str,
        subscription: &str,
        max_messages: usize,
    ) -> Result<Vec<PulledMessage>, BackendError> {
        self.record("pull");
        self.inner.pull(topic, subscription, max_messages).await
    }

    async fn acknowledge(
        &self,
        topic: &str,
        subscription: &str,
        ack_id: &str,
    ) -> Result<(), BackendError> {
        self.record("acknowledge");
        self.inner.acknowledge(topic, subscription, ack_id).await
    }

    async fn modify_ack_deadline(
        &self,
        topic: &str,
        subscription: &str,
        ack_id: &str,
        seconds: u64,
    ) -> Result<(), BackendError> {
        self.record("modify_ack_deadline");
        self.inner
            .modify_ack_deadline(topic, subscription, ack_id, seconds)
            .await
    }
}

pub(super) fn probe_queue() -> (Arc<ProbeBackend>, WorkQueue) {
    let backend = Arc::new(ProbeBackend::new());
    let queue = WorkQueue::new(backend.clone(), ConnectionConfig::default());
    (backend, queue)
}
