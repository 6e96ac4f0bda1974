use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::error::BackendError;

/// A message ready to publish: base64 body plus flat string attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingMessage {
    /// Base64-encoded body. The backend treats it as opaque text.
    pub data: String,
    pub attributes: BTreeMap<String, String>,
    /// Optional backend ordering key. The engine never sets this itself;
    /// callers opt in per publish.
    pub ordering_key: Option<String>,
}

/// A message received from a pull call. `ack_id` is the transport handle
/// used for acknowledge/deadline calls — unrelated to the envelope id.
#[derive(Debug, Clone)]
pub struct PulledMessage {
    pub ack_id: String,
    pub message_id: String,
    /// Base64-encoded body, exactly as published.
    pub data: String,
    pub attributes: HashMap<String, String>,
}

impl PulledMessage {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Capability surface of the messaging backend. Implementations must be
/// thread-safe; every call is one synchronous network round trip from the
/// engine's point of view.
///
/// `pull` has return-immediately semantics: it never waits for a message to
/// arrive, and an empty result is not an error. Create calls are expected to
/// be idempotent or tolerant of the resource already existing, so recovery
/// is safe to run from multiple processes concurrently.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn topic_exists(&self, topic: &str) -> Result<bool, BackendError>;

    async fn create_topic(&self, topic: &str) -> Result<(), BackendError>;

    /// Publish a batch of messages to a topic. Returns the backend-assigned
    /// message ids in input order.
    async fn publish(
        &self,
        topic: &str,
        messages: Vec<OutgoingMessage>,
    ) -> Result<Vec<String>, BackendError>;

    async fn subscription_exists(
        &self,
        topic: &str,
        subscription: &str,
    ) -> Result<bool, BackendError>;

    async fn create_subscription(
        &self,
        topic: &str,
        subscription: &str,
    ) -> Result<(), BackendError>;

    /// Pull at most `max_messages` without waiting. Pulled messages are
    /// invisible to other pullers until acknowledged or their ack deadline
    /// expires.
    async fn pull(
        &self,
        topic: &str,
        subscription: &str,
        max_messages: usize,
    ) -> Result<Vec<PulledMessage>, BackendError>;

    /// Acknowledge by transport handle. Redundant acks are tolerated.
    async fn acknowledge(
        &self,
        topic: &str,
        subscription: &str,
        ack_id: &str,
    ) -> Result<(), BackendError>;

    /// Extend (or shrink) the ack deadline of an outstanding message.
    async fn modify_ack_deadline(
        &self,
        topic: &str,
        subscription: &str,
        ack_id: &str,
        seconds: u64,
    ) -> Result<(), BackendError>;
}
