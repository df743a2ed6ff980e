//! Job tracker: the single source of truth for jobs known to this client.
//!
//! Every mutation goes through [`JobTracker::upsert`] or [`JobTracker::remove`],
//! which persist the whole mapping to the injected [`JobStore`] and publish a
//! [`JobEvent`] for renderers. Persistence failures are logged and never block
//! the in-memory update.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::events::{JobEvent, JobEventBus, topics};
use crate::job::{Job, JobKind, JobPatch, JobStatus, TransitionCause};
use crate::observability::JobLogEvent;
use crate::store::JobStore;

/// Result of one [`JobTracker::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Job did not exist and was inserted.
    Created,
    /// Job existed and changed.
    Updated,
    /// Nothing changed (identical update or rejected transition).
    Unchanged,
}

/// Owned job mapping with persistence and change notifications.
pub struct JobTracker<S: JobStore> {
    store: S,
    jobs: HashMap<String, Job>,
    order: Vec<String>,
    bus: JobEventBus,
}

impl<S: JobStore> JobTracker<S> {
    /// Load the tracker from `store`.
    ///
    /// Corrupt slot contents are cleared and the tracker starts empty.
    pub fn open(mut store: S, bus: JobEventBus) -> Self {
        let jobs = match store.load() {
            Ok(Some(raw)) => match serde_json::from_str::<HashMap<String, Job>>(&raw) {
                Ok(jobs) => jobs,
                Err(error) => {
                    tracing::warn!(
                        event = JobLogEvent::StoreCorrupted.as_str(),
                        error = %error,
                        "job slot is corrupted; resetting to empty"
                    );
                    if let Err(error) = store.clear() {
                        tracing::warn!(
                            event = JobLogEvent::StoreWriteFailed.as_str(),
                            error = %error,
                            "failed to clear corrupted job slot"
                        );
                    }
                    HashMap::new()
                }
            },
            Ok(None) => HashMap::new(),
            Err(error) => {
                tracing::warn!(
                    event = JobLogEvent::StoreCorrupted.as_str(),
                    error = %error,
                    "failed to read job slot; starting empty"
                );
                HashMap::new()
            }
        };

        let mut jobs: HashMap<String, Job> = jobs
            .into_iter()
            .map(|(id, mut job)| {
                job.id.clone_from(&id);
                (id, job)
            })
            .collect();
        for job in jobs.values_mut() {
            job.progress_percent = job.progress_percent.min(100);
        }

        let mut order: Vec<(DateTime<Utc>, String)> = jobs
            .values()
            .map(|job| (job.tracked_at, job.id.clone()))
            .collect();
        order.sort();
        let order = order.into_iter().map(|(_, id)| id).collect();

        tracing::debug!(
            event = JobLogEvent::StoreLoaded.as_str(),
            jobs = jobs.len(),
            "job tracker loaded"
        );

        Self {
            store,
            jobs,
            order,
            bus,
        }
    }

    /// Merge `patch` into job `id`, creating it when absent.
    pub fn upsert(&mut self, id: &str, patch: JobPatch, cause: TransitionCause) -> UpsertOutcome {
        let now = Utc::now();
        let (outcome, job) = match self.jobs.get(id) {
            None => (UpsertOutcome::Created, create_job(id, patch, now)),
            Some(current) => match merge_job(current, patch, cause, now) {
                Some(merged) if merged != *current => (UpsertOutcome::Updated, merged),
                _ => return UpsertOutcome::Unchanged,
            },
        };

        let (log_event, topic) = match outcome {
            UpsertOutcome::Created => (JobLogEvent::JobCreated, topics::JOB_CREATED),
            _ => (JobLogEvent::JobUpdated, topics::JOB_UPDATED),
        };
        tracing::debug!(
            event = log_event.as_str(),
            job_id = id,
            status = job.status.as_str(),
            progress = job.progress_percent,
            "job tracked"
        );

        if outcome == UpsertOutcome::Created {
            self.order.push(id.to_string());
        }
        self.jobs.insert(id.to_string(), job.clone());
        self.persist();
        self.bus.publish(JobEvent::new(id, topic, Some(job)));
        outcome
    }

    /// Current snapshot of job `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// Delete job `id`; other entries are untouched.
    pub fn remove(&mut self, id: &str) -> Option<Job> {
        let removed = self.jobs.remove(id)?;
        self.order.retain(|entry| entry != id);
        tracing::debug!(
            event = JobLogEvent::JobRemoved.as_str(),
            job_id = id,
            "job removed"
        );
        self.persist();
        self.bus
            .publish(JobEvent::new(id, topics::JOB_REMOVED, None));
        Some(removed)
    }

    /// Jobs, most recently tracked first. Clone the iterator to restart it.
    pub fn list(&self) -> impl Iterator<Item = &Job> + Clone + '_ {
        self.order
            .iter()
            .rev()
            .filter_map(move |id| self.jobs.get(id))
    }

    /// Number of tracked jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// No jobs tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.bus.subscribe()
    }

    /// Backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn persist(&mut self) {
        let raw = match serde_json::to_string(&self.jobs) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(
                    event = JobLogEvent::StoreWriteFailed.as_str(),
                    error = %error,
                    "failed to encode job mapping"
                );
                return;
            }
        };
        if let Err(error) = self.store.save(&raw) {
            tracing::warn!(
                event = JobLogEvent::StoreWriteFailed.as_str(),
                error = %error,
                jobs = self.jobs.len(),
                "failed to persist job mapping; keeping in-memory state"
            );
        }
    }
}

fn create_job(id: &str, patch: JobPatch, now: DateTime<Utc>) -> Job {
    let status = patch.status.unwrap_or(JobStatus::Pending);
    let progress_percent = if status == JobStatus::Succeeded {
        100
    } else {
        patch.progress_percent.unwrap_or(0).min(100)
    };
    Job {
        id: id.to_string(),
        kind: patch.kind.unwrap_or(JobKind::Unknown),
        status,
        title: non_empty(patch.title),
        source_name: non_empty(patch.source_name),
        started_at: patch.started_at.unwrap_or(now),
        finished_at: status.is_terminal().then_some(now),
        tracked_at: now,
        progress_percent,
        text: patch.text.unwrap_or_default(),
        error: non_empty(patch.error),
        push_channel_id: non_empty(patch.push_channel_id),
        stage: non_empty(patch.stage),
        processing_time: non_empty(patch.processing_time),
    }
}

/// Merge a patch into `current`. `None` when the requested transition is illegal
/// for `cause`; the whole patch is then treated as stale.
fn merge_job(
    current: &Job,
    patch: JobPatch,
    cause: TransitionCause,
    now: DateTime<Utc>,
) -> Option<Job> {
    let previous = current.status;
    let status = match patch.status {
        Some(requested) if !previous.can_transition(requested, cause) => {
            tracing::warn!(
                event = JobLogEvent::TransitionRejected.as_str(),
                job_id = %current.id,
                from = previous.as_str(),
                to = requested.as_str(),
                cause = ?cause,
                "rejected job status transition"
            );
            return None;
        }
        Some(requested) => requested,
        None => previous,
    };

    let mut next = current.clone();
    next.status = status;
    let entered = status != previous;

    if let Some(progress) = patch.progress_percent {
        let progress = progress.min(100);
        next.progress_percent = if !entered && status.is_in_flight() {
            current.progress_percent.max(progress)
        } else {
            progress
        };
    }
    if status == JobStatus::Succeeded {
        next.progress_percent = 100;
    }

    if let Some(text) = patch.text {
        let frozen = previous == JobStatus::Succeeded && cause == TransitionCause::Live;
        let would_clear = text.trim().is_empty() && current.has_text();
        if !frozen && !would_clear {
            next.text = text;
        }
    }

    if let Some(kind) = patch.kind
        && current.kind == JobKind::Unknown
    {
        next.kind = kind;
    }
    if let Some(title) = non_empty(patch.title) {
        next.title = Some(title);
    }
    if let Some(source_name) = non_empty(patch.source_name) {
        next.source_name = Some(source_name);
    }
    if let Some(channel) = non_empty(patch.push_channel_id) {
        next.push_channel_id = Some(channel);
    }
    if let Some(stage) = non_empty(patch.stage) {
        next.stage = Some(stage);
    }
    if let Some(processing_time) = non_empty(patch.processing_time) {
        next.processing_time = Some(processing_time);
    }
    if cause == TransitionCause::Reconcile
        && let Some(started_at) = patch.started_at
    {
        next.started_at = started_at;
    }

    if entered && status != JobStatus::Failed {
        next.error = None;
    }
    if let Some(error) = non_empty(patch.error) {
        next.error = Some(error);
    }

    if entered {
        next.finished_at = if status.is_terminal() {
            Some(now)
        } else {
            None
        };
    }

    Some(next)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn tracker() -> JobTracker<MemoryStore> {
        JobTracker::open(MemoryStore::new(), JobEventBus::new(16))
    }

    fn running(progress: u8) -> JobPatch {
        JobPatch::status(JobStatus::Running).with_progress(progress)
    }

    #[test]
    fn running_progress_never_decreases() {
        let mut tracker = tracker();
        tracker.upsert("a", running(40), TransitionCause::Live);
        tracker.upsert("a", running(25), TransitionCause::Live);
        assert_eq!(tracker.get("a").unwrap().progress_percent, 40);
    }

    #[test]
    fn new_running_phase_restarts_progress() {
        let mut tracker = tracker();
        tracker.upsert("a", running(80), TransitionCause::Live);
        tracker.upsert("a", JobPatch::status(JobStatus::Failed), TransitionCause::Live);
        tracker.upsert(
            "a",
            JobPatch::status(JobStatus::PendingResume),
            TransitionCause::Resume,
        );
        tracker.upsert("a", running(25), TransitionCause::Live);
        let job = tracker.get("a").unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.progress_percent, 25);
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn empty_text_never_clears_transcript() {
        let mut tracker = tracker();
        tracker.upsert("a", JobPatch::default().with_text("hello"), TransitionCause::Live);
        tracker.upsert("a", JobPatch::default().with_text(""), TransitionCause::Live);
        assert_eq!(tracker.get("a").unwrap().text, "hello");
    }

    #[test]
    fn stale_live_patch_after_completion_is_dropped() {
        let mut tracker = tracker();
        tracker.upsert(
            "a",
            JobPatch::status(JobStatus::Succeeded).with_text("final"),
            TransitionCause::Live,
        );
        let outcome = tracker.upsert(
            "a",
            running(50).with_text("partial"),
            TransitionCause::Live,
        );
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        let job = tracker.get("a").unwrap();
        assert_eq!(job.text, "final");
        assert_eq!(job.progress_percent, 100);
    }

    #[test]
    fn succeeded_text_is_frozen_against_live_updates() {
        let mut tracker = tracker();
        tracker.upsert(
            "a",
            JobPatch::status(JobStatus::Succeeded).with_text("final"),
            TransitionCause::Live,
        );
        tracker.upsert("a", JobPatch::default().with_text("late"), TransitionCause::Live);
        assert_eq!(tracker.get("a").unwrap().text, "final");
    }

    #[test]
    fn identical_updates_are_unchanged() {
        let mut tracker = tracker();
        let patch = running(10).with_text("x");
        assert_eq!(
            tracker.upsert("a", patch.clone(), TransitionCause::Live),
            UpsertOutcome::Created
        );
        assert_eq!(
            tracker.upsert("a", patch, TransitionCause::Live),
            UpsertOutcome::Unchanged
        );
    }

    #[test]
    fn entering_running_clears_error_and_failure_sets_finished_at() {
        let mut tracker = tracker();
        tracker.upsert(
            "a",
            JobPatch::status(JobStatus::Failed).with_error("boom"),
            TransitionCause::Live,
        );
        assert!(tracker.get("a").unwrap().finished_at.is_some());
        tracker.upsert("a", JobPatch::status(JobStatus::Running), TransitionCause::Resume);
        let job = tracker.get("a").unwrap();
        assert!(job.error.is_none());
        assert!(job.finished_at.is_none());
    }
}
