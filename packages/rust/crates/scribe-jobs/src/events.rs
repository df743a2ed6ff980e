//! Change notifications for tracked jobs.
//!
//! Renderers subscribe to a [`JobEventBus`] instead of polling the tracker.
//!
//! ```text
//! JobTracker.upsert()/remove()
//!      ↓
//! JobEventBus.publish() → broadcast::Sender
//!      ↓
//! Fan-out to every subscribed view
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::job::Job;

/// Default bus capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// One change to the tracked job mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Event id (uuid v4).
    pub id: String,
    /// Job the change applies to
    pub job_id: String,
    /// Event topic (see [`topics`])
    pub topic: String,
    /// Snapshot after the change; `None` for removals
    pub job: Option<Job>,
    /// When the change happened.
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    /// Event stamped now with a fresh id.
    pub fn new(job_id: impl Into<String>, topic: impl Into<String>, job: Option<Job>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_id: job_id.into(),
            topic: topic.into(),
            job,
            timestamp: Utc::now(),
        }
    }
}

impl std::fmt::Display for JobEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.job.as_ref().map_or("-", |job| job.status.as_str());
        write!(
            f,
            "[{}] {} -> {} ({status})",
            self.timestamp.format("%H:%M:%S"),
            self.topic,
            self.job_id,
        )
    }
}

/// Broadcast bus for [`JobEvent`]s.
///
/// Publishing never blocks; lagging subscribers lose the oldest events.
#[derive(Clone)]
pub struct JobEventBus {
    tx: broadcast::Sender<JobEvent>,
    capacity: usize,
}

impl JobEventBus {
    /// Bus buffering up to `capacity` events per subscriber (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Per-subscriber buffer size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fan `event` out. Returns how many subscribers got it; zero is fine.
    pub fn publish(&self, event: JobEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// New receiver; drop it to unsubscribe.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    /// Live receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for JobEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Topics carried in [`JobEvent::topic`].
pub mod topics {
    /// A job entered the tracker.
    pub const JOB_CREATED: &str = "job/created";
    /// A tracked job changed.
    pub const JOB_UPDATED: &str = "job/updated";
    /// A job left the tracker.
    pub const JOB_REMOVED: &str = "job/removed";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_publish() {
        let bus = JobEventBus::new(10);
        let mut rx = bus.subscribe();

        bus.publish(JobEvent::new("job-1", topics::JOB_REMOVED, None));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.job_id, "job-1");
        assert_eq!(received.topic, topics::JOB_REMOVED);
        assert!(!received.id.is_empty());
    }

    #[test]
    fn test_publish_without_subscribers_is_not_an_error() {
        let bus = JobEventBus::new(0);
        assert_eq!(bus.capacity(), 1);
        assert_eq!(bus.publish(JobEvent::new("x", topics::JOB_UPDATED, None)), 0);
    }

    #[test]
    fn test_subscriber_count() {
        let bus = JobEventBus::default();
        assert_eq!(bus.subscriber_count(), 0);

        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }
}
