use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::debug;

use crate::backend::{Backend, OutgoingMessage, PulledMessage};
use crate::config::ConnectionConfig;
use crate::envelope::{self, Envelope, ATTR_AVAILABLE_AT};
use crate::error::{QueueError, Result};
use crate::job::Job;
use crate::topic::TopicResolver;
use crate::transform::TransformRegistry;

/// Delay for `later`, `republish`, and `release`: a relative number of
/// seconds or an absolute UNIX timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    Seconds(u64),
    At(u64),
}

impl Delay {
    pub fn none() -> Self {
        Delay::Seconds(0)
    }

    /// Resolve to the absolute availability timestamp.
    pub fn available_at(&self, now: u64) -> u64 {
        match self {
            Delay::Seconds(seconds) => now + seconds,
            Delay::At(timestamp) => *timestamp,
        }
    }
}

impl From<Duration> for Delay {
    fn from(duration: Duration) -> Self {
        Delay::Seconds(duration.as_secs())
    }
}

/// Caller-supplied publish options: message attributes (validated as flat
/// string-to-string before any backend call) and an optional ordering key.
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    pub attributes: serde_json::Map<String, Value>,
    pub ordering_key: Option<String>,
}

impl PushOptions {
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_ordering_key(mut self, key: impl Into<String>) -> Self {
        self.ordering_key = Some(key.into());
        self
    }
}

/// The work-queue surface on top of a pub/sub backend.
///
/// Logical queue names map to backend topics; one subscription per topic
/// (named after the configured subscriber) represents the consumer group.
/// Delay and attempt tracking ride on message attributes, enforced
/// cooperatively at pop time — the backend itself knows nothing about
/// either.
///
/// Cloning is cheap and every clone talks to the same backend; there is no
/// shared mutable engine state, so concurrent consumers simply run their
/// own `pop` loops against the same subscription.
#[derive(Clone)]
pub struct WorkQueue {
    backend: Arc<dyn Backend>,
    config: ConnectionConfig,
    transforms: TransformRegistry,
}

impl WorkQueue {
    pub fn new(backend: Arc<dyn Backend>, config: ConnectionConfig) -> Self {
        Self {
            backend,
            config,
            transforms: TransformRegistry::default(),
        }
    }

    pub fn with_transforms(mut self, transforms: TransformRegistry) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn subscriber(&self) -> &str {
        &self.config.subscriber
    }

    /// Resolve a logical queue name to its backend topic name.
    ///
    /// An entry in the subscriber-topic table wins outright; otherwise the
    /// configured prefix is applied unless the name already carries it.
    /// Idempotent: resolving an already-resolved name changes nothing,
    /// which lets resolved names be passed back into engine calls safely.
    pub fn queue_name(&self, queue: Option<&str>) -> String {
        let name = queue.unwrap_or(&self.config.default_queue);

        if let Some(topic) = self.config.subscriber_topics.get(name) {
            return topic.clone();
        }
        // A name that is already a resolved table entry maps to itself, so
        // resolved names can be fed back into any engine call.
        if self.config.subscriber_topics.values().any(|topic| topic == name) {
            return name.to_string();
        }

        match &self.config.prefix {
            Some(prefix) if !prefix.is_empty() => {
                let prefixed = format!("{prefix}-");
                if name.starts_with(&prefixed) {
                    name.to_string()
                } else {
                    format!("{prefixed}{name}")
                }
            }
            _ => name.to_string(),
        }
    }

    /// Push a new job onto the queue. Returns the envelope id.
    pub async fn push(&self, job: &str, data: Value, queue: Option<&str>) -> Result<String> {
        let payload = Envelope::new(job, data).to_json()?;
        self.push_raw(&payload, queue, PushOptions::default()).await
    }

    /// Push a raw payload. The payload must be a JSON document carrying at
    /// least an `id` field; it is base64-encoded for the wire here.
    pub async fn push_raw(
        &self,
        payload: &[u8],
        queue: Option<&str>,
        options: PushOptions,
    ) -> Result<String> {
        // Both checks fail fast, before any network round trip.
        let attributes = validate_message_attributes(&options.attributes)?;
        let id = envelope_id(payload)?;

        let topic = self.queue_name(queue);
        self.ensure_topic(&topic).await?;
        self.ensure_subscription(&topic).await?;

        let message = OutgoingMessage {
            data: envelope::encode_body(payload),
            attributes,
            ordering_key: options.ordering_key,
        };
        self.resolver(&topic).publish(vec![message]).await?;

        debug!(%topic, job_id = %id, "pushed job");
        Ok(id)
    }

    /// Push a job that becomes available only after `delay`. The delay is
    /// carried as the `available_at` attribute and enforced cooperatively
    /// at pop time; the backend delivers the message whenever it likes.
    pub async fn later(
        &self,
        delay: Delay,
        job: &str,
        data: Value,
        queue: Option<&str>,
    ) -> Result<String> {
        let payload = Envelope::new(job, data).to_json()?;
        let options = PushOptions::default()
            .with_attribute(ATTR_AVAILABLE_AT, delay.available_at(unix_now()).to_string());
        self.push_raw(&payload, queue, options).await
    }

    /// Push one envelope per job in a single batch publish. No per-message
    /// delay. Returns the envelope ids in input order.
    pub async fn bulk(&self, jobs: &[&str], data: Value, queue: Option<&str>) -> Result<Vec<String>> {
        let topic = self.queue_name(queue);
        self.ensure_topic(&topic).await?;
        self.ensure_subscription(&topic).await?;

        let mut ids = Vec::with_capacity(jobs.len());
        let mut messages = Vec::with_capacity(jobs.len());
        for job in jobs {
            let envelope = Envelope::new(*job, data.clone());
            ids.push(envelope.id.clone());
            messages.push(OutgoingMessage {
                data: envelope::encode_body(&envelope.to_json()?),
                attributes: BTreeMap::new(),
                ordering_key: None,
            });
        }

        self.resolver(&topic).publish(messages).await?;
        debug!(%topic, count = jobs.len(), "pushed job batch");
        Ok(ids)
    }

    /// Pop the next due job, never waiting for one to arrive.
    ///
    /// A missing topic and an empty pull are both normal "no work"
    /// outcomes. A pulled message whose `available_at` lies in the future
    /// is deferred: its ack deadline is extended by the remaining seconds
    /// so no other consumer sees it early, and `None` is returned. A due
    /// message is acknowledged at pull time — a consumer crash after this
    /// point loses the delivery, which is the accepted trade-off for not
    /// holding ack deadlines across job execution.
    pub async fn pop(&self, queue: Option<&str>) -> Result<Option<Job>> {
        let topic = self.queue_name(queue);

        // Skip the pull round trip entirely when the topic does not exist;
        // lazily created topics simply have no work yet.
        if !self.backend.topic_exists(&topic).await? {
            debug!(%topic, "pop on nonexistent topic, no job");
            return Ok(None);
        }

        let messages = self
            .backend
            .pull(&topic, self.subscriber(), 1)
            .await?;
        let Some(message) = messages.into_iter().next() else {
            return Ok(None);
        };

        let now = unix_now();
        if let Some(available_at) = message
            .attribute(ATTR_AVAILABLE_AT)
            .and_then(|value| value.parse::<u64>().ok())
        {
            if available_at > now {
                let remaining = available_at - now;
                debug!(%topic, message_id = %message.message_id, remaining, "job not yet due, deferring");
                self.modify_ack_deadline(&message, Some(&topic), remaining).await?;
                return Ok(None);
            }
        }

        self.acknowledge(&message, Some(&topic)).await?;

        let body = envelope::decode_body(&message.data)?;
        let body = self.transforms.apply(self.subscriber(), body)?;
        let job = Job::new(self.clone(), message, topic, body)?;
        Ok(Some(job))
    }

    /// Acknowledge a pulled message by its transport handle. Redundant acks
    /// are backend no-ops.
    pub async fn acknowledge(&self, message: &PulledMessage, queue: Option<&str>) -> Result<()> {
        let topic = self.queue_name(queue);
        self.backend
            .acknowledge(&topic, self.subscriber(), &message.ack_id)
            .await?;
        Ok(())
    }

    /// Extend the ack deadline of a pulled message.
    pub async fn modify_ack_deadline(
        &self,
        message: &PulledMessage,
        queue: Option<&str>,
        seconds: u64,
    ) -> Result<()> {
        let topic = self.queue_name(queue);
        self.backend
            .modify_ack_deadline(&topic, self.subscriber(), &message.ack_id, seconds)
            .await?;
        Ok(())
    }

    /// Publish a fresh copy of a pulled message's body on the same topic
    /// with a new `available_at`. Caller attributes are validated and win
    /// over the computed `available_at`. The original message's ack state
    /// is untouched.
    pub async fn republish(
        &self,
        message: &PulledMessage,
        queue: Option<&str>,
        options: PushOptions,
        delay: Delay,
    ) -> Result<Vec<String>> {
        let topic = self.queue_name(queue);

        let mut attributes = BTreeMap::new();
        attributes.insert(
            ATTR_AVAILABLE_AT.to_string(),
            delay.available_at(unix_now()).to_string(),
        );
        attributes.extend(validate_message_attributes(&options.attributes)?);

        let outgoing = OutgoingMessage {
            data: message.data.clone(),
            attributes,
            ordering_key: options.ordering_key,
        };
        Ok(self.resolver(&topic).publish(vec![outgoing]).await?)
    }

    /// Acknowledge the original message, then publish a fresh copy. This is
    /// the requeue path behind `Job::release`.
    ///
    /// Not transactional: pub/sub offers no atomic ack+publish, so a crash
    /// between the two calls loses the message. At-least-once delivery
    /// holds only up to that window; no retry is attempted here because a
    /// retry could double-publish instead.
    pub async fn acknowledge_and_publish(
        &self,
        message: &PulledMessage,
        queue: Option<&str>,
        options: PushOptions,
        delay: Delay,
    ) -> Result<Vec<String>> {
        self.acknowledge(message, queue).await?;
        self.republish(message, queue, options, delay).await
    }

    /// The backend exposes no cheap, reliable queue depth, so this reports
    /// zero unconditionally rather than approximating.
    pub fn size(&self, _queue: Option<&str>) -> u64 {
        0
    }

    fn resolver(&self, topic: &str) -> TopicResolver {
        TopicResolver::new(
            Arc::clone(&self.backend),
            topic,
            self.config.subscriber.clone(),
            self.config.create_topics,
            self.config.create_subscriptions,
        )
    }

    async fn ensure_topic(&self, topic: &str) -> Result<()> {
        if self.config.create_topics && !self.backend.topic_exists(topic).await? {
            self.backend.create_topic(topic).await?;
            debug!(%topic, "created topic");
        }
        Ok(())
    }

    async fn ensure_subscription(&self, topic: &str) -> Result<()> {
        if self.config.create_subscriptions
            && !self
                .backend
                .subscription_exists(topic, self.subscriber())
                .await?
        {
            self.resolver(topic).subscribe(self.subscriber()).await?;
            debug!(%topic, subscriber = %self.subscriber(), "created subscription");
        }
        Ok(())
    }
}

/// Reject any attribute whose value is not a JSON string. Non-string keys
/// are unrepresentable in a JSON map, so the key half of the contract is
/// enforced by the type; values are checked here, before any backend call.
pub fn validate_message_attributes(
    attributes: &serde_json::Map<String, Value>,
) -> Result<BTreeMap<String, String>> {
    let mut validated = BTreeMap::new();
    for (key, value) in attributes {
        match value {
            Value::String(s) => {
                validated.insert(key.clone(), s.clone());
            }
            other => {
                return Err(QueueError::InvalidAttribute {
                    key: key.clone(),
                    kind: json_kind(other),
                })
            }
        }
    }
    Ok(validated)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn envelope_id(payload: &[u8]) -> Result<String> {
    let value: Value = serde_json::from_slice(payload)?;
    value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(QueueError::MissingJobId)
}

/// Current UNIX timestamp in whole seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_secs()
}

#[cfg(test)]
mod tests;
