use tracing::debug;

use crate::backend::PulledMessage;
use crate::envelope::{Envelope, ATTR_ATTEMPTS};
use crate::error::Result;
use crate::queue::{Delay, PushOptions, WorkQueue};

/// One pulled message, handed to a consumer with exactly one decision to
/// make: accept it (`delete`) or send it back for retry (`release`).
///
/// Attempt-count convention: a message that has never been released carries
/// no `attempts` attribute and reports `attempts() == 0`; the first release
/// republishes with `attempts = 1`, the second with `2`, and so on. The
/// count is tied to the envelope id, not the transport message id — every
/// release creates a brand-new transport message for the same logical job.
pub struct Job {
    queue: WorkQueue,
    message: PulledMessage,
    queue_name: String,
    envelope: Envelope,
    body: Vec<u8>,
    deleted: bool,
    released: bool,
}

impl Job {
    pub(crate) fn new(
        queue: WorkQueue,
        message: PulledMessage,
        queue_name: String,
        body: Vec<u8>,
    ) -> Result<Self> {
        let envelope = Envelope::from_json(&body)?;
        Ok(Self {
            queue,
            message,
            queue_name,
            envelope,
            body,
            deleted: false,
            released: false,
        })
    }

    /// The envelope id — the logical job identity. Not the backend's
    /// transport message id, which changes on every redelivery.
    pub fn job_id(&self) -> &str {
        &self.envelope.id
    }

    /// The handler identifier from the envelope.
    pub fn name(&self) -> &str {
        &self.envelope.job
    }

    /// The decoded envelope bytes, exactly as they were published (after
    /// any subscriber payload transform).
    pub fn raw_body(&self) -> &[u8] {
        &self.body
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// The logical queue this job was popped from.
    pub fn queue(&self) -> &str {
        &self.queue_name
    }

    /// How many times this job has been released. Absent attribute means
    /// never released: 0.
    pub fn attempts(&self) -> u32 {
        self.message
            .attribute(ATTR_ATTEMPTS)
            .and_then(|value| value.parse().ok())
            .unwrap_or(0)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Accept the job: acknowledge it with the backend. A second call is a
    /// local no-op.
    pub async fn delete(&mut self) -> Result<()> {
        if self.deleted {
            return Ok(());
        }
        self.deleted = true;
        debug!(job_id = %self.job_id(), queue = %self.queue_name, "job deleted");
        self.queue
            .acknowledge(&self.message, Some(&self.queue_name))
            .await
    }

    /// Reject the job: requeue a copy with the attempt count incremented by
    /// one and availability pushed out by `delay`. The caller picks the
    /// delay to implement its backoff policy. A second call is a local
    /// no-op.
    pub async fn release(&mut self, delay: Delay) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let attempts = self.attempts() + 1;
        debug!(
            job_id = %self.job_id(),
            queue = %self.queue_name,
            attempts,
            "job released for retry"
        );
        let options =
            PushOptions::default().with_attribute(ATTR_ATTEMPTS, attempts.to_string());
        self.queue
            .acknowledge_and_publish(&self.message, Some(&self.queue_name), options, delay)
            .await?;
        Ok(())
    }
}
