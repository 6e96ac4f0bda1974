use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

/// Attribute key carrying the cooperative delay marker: a decimal UNIX
/// timestamp; the message is due once current time reaches it.
pub const ATTR_AVAILABLE_AT: &str = "available_at";

/// Attribute key carrying the redelivery counter as a decimal string.
pub const ATTR_ATTEMPTS: &str = "attempts";

/// The JSON document carried in every message body. This is the logical job
/// identity — distinct from the backend's transport-level message id, which
/// changes on every republish.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub id: String,
    pub job: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl Envelope {
    /// Build an envelope with a fresh random id. The id is generated once
    /// here and survives every redelivery and requeue of this job.
    pub fn new(job: impl Into<String>, data: Value) -> Self {
        Self {
            id: new_job_id(),
            job: job.into(),
            data,
            attempts: None,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// 32-character random job id: a v4 UUID in simple form. Collision
/// probability is negligible at any realistic message volume; uniqueness is
/// best-effort, not backend-enforced.
pub fn new_job_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Encode a message body for the wire. Backend message bodies are opaque
/// bytes; base64 is the chosen textual encoding.
pub fn encode_body(payload: &[u8]) -> String {
    BASE64.encode(payload)
}

/// Undo [`encode_body`]. Must round-trip byte-exact.
pub fn decode_body(data: &str) -> Result<Vec<u8>> {
    Ok(BASE64.decode(data)?)
}
