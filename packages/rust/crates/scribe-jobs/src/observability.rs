//! Structured log event names shared by the tracker and the dispatcher.

/// Value of the `event` field on job-related log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobLogEvent {
    /// Slot loaded at startup.
    StoreLoaded,
    /// Slot held unparsable JSON and was reset.
    StoreCorrupted,
    /// Slot write failed; in-memory state kept.
    StoreWriteFailed,
    /// Job inserted.
    JobCreated,
    /// Job merged.
    JobUpdated,
    /// Job deleted.
    JobRemoved,
    /// Patch rejected by the transition rules.
    TransitionRejected,
    /// Push message with a tag we do not know.
    UnknownMessage,
    /// Push message that is not valid JSON or lacks a tag.
    MalformedMessage,
    /// Channel closed abnormally while work was in flight.
    ConnectionLost,
    /// Response superseded by a newer request.
    StaleResponseDiscarded,
}

impl JobLogEvent {
    /// Stable dotted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StoreLoaded => "jobs.store.loaded",
            Self::StoreCorrupted => "jobs.store.corrupted",
            Self::StoreWriteFailed => "jobs.store.write_failed",
            Self::JobCreated => "jobs.job.created",
            Self::JobUpdated => "jobs.job.updated",
            Self::JobRemoved => "jobs.job.removed",
            Self::TransitionRejected => "jobs.transition.rejected",
            Self::UnknownMessage => "jobs.message.unknown",
            Self::MalformedMessage => "jobs.message.malformed",
            Self::ConnectionLost => "jobs.channel.connection_lost",
            Self::StaleResponseDiscarded => "jobs.guard.stale_response_discarded",
        }
    }
}
