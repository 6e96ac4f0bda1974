use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{Backend, OutgoingMessage};
use crate::error::BackendError;

/// Publish/subscribe operations on one topic that transparently recover from
/// the topic or its subscription missing at call time.
///
/// Topic and subscription existence is eventually consistent and racy:
/// another process may delete or create either resource concurrently. Each
/// operation recovers at most once — recreate what policy allows, retry the
/// call once, and propagate any second failure. No unbounded retry.
pub struct TopicResolver {
    backend: Arc<dyn Backend>,
    topic: String,
    subscription: String,
    create_topics: bool,
    /// Scope-overridable: `subscribe` disables subscription auto-creation
    /// for its own duration, since the call itself is the creation.
    create_subscriptions: AtomicBool,
}

impl TopicResolver {
    pub fn new(
        backend: Arc<dyn Backend>,
        topic: impl Into<String>,
        subscription: impl Into<String>,
        create_topics: bool,
        create_subscriptions: bool,
    ) -> Self {
        Self {
            backend,
            topic: topic.into(),
            subscription: subscription.into(),
            create_topics,
            create_subscriptions: AtomicBool::new(create_subscriptions),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish one or more messages, recovering once from a missing topic.
    pub async fn publish(
        &self,
        messages: Vec<OutgoingMessage>,
    ) -> Result<Vec<String>, BackendError> {
        match self.backend.publish(&self.topic, messages.clone()).await {
            Ok(ids) => Ok(ids),
            Err(err) if err.is_not_found() => {
                warn!(topic = %self.topic, error = %err, "publish hit missing resource, recovering");
                self.recover(err).await?;
                self.backend.publish(&self.topic, messages).await
            }
            Err(err) => Err(err),
        }
    }

    /// Create a subscription on this topic, recovering once from the topic
    /// being missing. Subscription auto-creation is disabled while the call
    /// runs — the call itself is the creation, and the recovery path must
    /// not re-subscribe recursively.
    pub async fn subscribe(&self, name: &str) -> Result<(), BackendError> {
        let _guard = PolicyGuard::disable(&self.create_subscriptions);

        match self.backend.create_subscription(&self.topic, name).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => {
                warn!(topic = %self.topic, subscription = name, error = %err, "subscribe hit missing topic, recovering");
                self.recover(err).await?;
                self.backend.create_subscription(&self.topic, name).await
            }
            Err(err) => Err(err),
        }
    }

    /// Recovery procedure for a not-found failure. Recreates the topic
    /// and/or its subscription as policy allows; if the missing resource's
    /// auto-creation policy is off, the original error is returned
    /// unmodified so the caller sees exactly what the backend reported.
    async fn recover(&self, original: BackendError) -> Result<(), BackendError> {
        let topic_existed = self.backend.topic_exists(&self.topic).await?;

        if !topic_existed {
            if !self.create_topics {
                return Err(original);
            }
            self.backend.create_topic(&self.topic).await?;
            debug!(topic = %self.topic, "recreated missing topic");
            // A fresh topic has no subscriptions; recreate ours regardless
            // of the subscription policy so pulls keep working.
            self.backend
                .create_subscription(&self.topic, &self.subscription)
                .await?;
            debug!(topic = %self.topic, subscription = %self.subscription, "recreated subscription");
            return Ok(());
        }

        if self.create_subscriptions.load(Ordering::SeqCst)
            && !self
                .backend
                .subscription_exists(&self.topic, &self.subscription)
                .await?
        {
            self.backend
                .create_subscription(&self.topic, &self.subscription)
                .await?;
            debug!(topic = %self.topic, subscription = %self.subscription, "recreated subscription");
        }

        Ok(())
    }
}

/// Scoped override of the subscription auto-creation flag. Restores the
/// original value on every exit path, including unwinds.
struct PolicyGuard<'a> {
    flag: &'a AtomicBool,
    original: bool,
}

impl<'a> PolicyGuard<'a> {
    fn disable(flag: &'a AtomicBool) -> Self {
        let original = flag.swap(false, Ordering::SeqCst);
        Self { flag, original }
    }
}

impl Drop for PolicyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(self.original, Ordering::SeqCst);
    }
}
