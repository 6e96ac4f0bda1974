use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::envelope::Envelope;
use crate::error::Result;

/// Rewrites a decoded message body before it is handed to a job.
///
/// Some subscriptions receive messages published by systems that do not
/// speak the envelope format. A transform registered for such a subscriber
/// rewrites each pulled body into the shape the host framework expects.
pub trait PayloadTransform: Send + Sync {
    fn transform(&self, subscriber: &str, body: &[u8]) -> Result<Vec<u8>>;
}

/// Registered mapping of subscriber name to payload transform. Subscribers
/// without an entry get their bodies untouched.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, Arc<dyn PayloadTransform>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        subscriber: impl Into<String>,
        transform: Arc<dyn PayloadTransform>,
    ) -> Self {
        self.transforms.insert(subscriber.into(), transform);
        self
    }

    pub fn get(&self, subscriber: &str) -> Option<&Arc<dyn PayloadTransform>> {
        self.transforms.get(subscriber)
    }

    /// Apply the subscriber's transform, or pass the body through unchanged.
    pub fn apply(&self, subscriber: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        match self.transforms.get(subscriber) {
            Some(transform) => transform.transform(subscriber, &body),
            None => Ok(body),
        }
    }
}

/// Re-wraps a foreign JSON body into the envelope shape, assigning the
/// configured handler identifier. Bodies that already parse as envelopes
/// pass through untouched.
pub struct ExternalEventTransform {
    job: String,
}

impl ExternalEventTransform {
    pub fn new(job: impl Into<String>) -> Self {
        Self { job: job.into() }
    }
}

impl PayloadTransform for ExternalEventTransform {
    fn transform(&self, _subscriber: &str, body: &[u8]) -> Result<Vec<u8>> {
        if Envelope::from_json(body).is_ok() {
            return Ok(body.to_vec());
        }

        let data = serde_json::from_slice::<Value>(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));
        Envelope::new(self.job.clone(), data).to_json()
    }
}
