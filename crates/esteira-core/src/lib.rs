pub mod backend;
pub mod config;
pub mod envelope;
pub mod error;
pub mod job;
pub mod queue;
pub mod telemetry;
pub mod topic;
pub mod transform;

pub use backend::{Backend, MemoryBackend, OutgoingMessage, PulledMessage};
pub use config::{ConnectionConfig, EsteiraConfig, WorkerConfig};
pub use envelope::{Envelope, ATTR_ATTEMPTS, ATTR_AVAILABLE_AT};
pub use error::{BackendError, QueueError, Result};
pub use job::Job;
pub use queue::{Delay, PushOptions, WorkQueue};
pub use topic::TopicResolver;
pub use transform::{ExternalEventTransform, PayloadTransform, TransformRegistry};
