/// Errors surfaced by the messaging backend transport.
/// This is the error type for the `Backend` trait — backend calls can only
/// fail with transport/resource errors, never queue-domain errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl BackendError {
    /// Whether this error means the topic or subscription is missing.
    /// The resolver uses this to decide when recovery applies.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

/// Application-level errors for the queue engine and job handle.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Caller-supplied message attributes must be flat string-to-string
    /// pairs. Raised before any backend call is made.
    #[error("message attribute {key:?} must be a string, got {kind}")]
    InvalidAttribute { key: String, kind: &'static str },

    /// A raw payload pushed through `push_raw` must carry an `id` field.
    #[error("payload has no id field")]
    MissingJobId,

    #[error("envelope serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid base64 message body: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, QueueError>;
