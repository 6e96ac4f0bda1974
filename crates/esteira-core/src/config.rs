use std::collections::HashMap;

use serde::Deserialize;

/// Top-level configuration, deserializable from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EsteiraConfig {
    pub connection: ConnectionConfig,
    pub worker: WorkerConfig,
}

/// Queue connection configuration: naming, policies, and the optional
/// subscriber-to-topic table for queues modeled as named subscribers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Logical queue used when an operation passes no explicit queue.
    pub default_queue: String,
    /// Subscription name identifying this consumer group.
    pub subscriber: String,
    /// Optional prefix applied to logical queue names when resolving the
    /// topic. Applied at most once — re-resolving a resolved name is a
    /// no-op.
    pub prefix: Option<String>,
    /// Create missing topics lazily on first publish.
    pub create_topics: bool,
    /// Create missing subscriptions lazily on first subscribe.
    pub create_subscriptions: bool,
    /// Explicit subscriber-name to topic-name table. Entries here win over
    /// prefixing.
    pub subscriber_topics: HashMap<String, String>,
}

/// Consumer loop configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Seconds to sleep when a pop finds no job.
    pub sleep_seconds: u64,
    /// Attempts after which a repeatedly failing job is dropped instead of
    /// released again.
    pub max_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            default_queue: "default".to_string(),
            subscriber: "subscriber".to_string(),
            prefix: None,
            create_topics: true,
            create_subscriptions: true,
            subscriber_topics: HashMap::new(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sleep_seconds: 3,
            max_attempts: 5,
        }
    }
}
