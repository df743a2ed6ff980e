//! Job record, status lattice and partial updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a transcription job's audio comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    /// Remote video fetched by the server.
    RemoteVideo {
        /// Source URL submitted by the user.
        url: String,
    },
    /// File uploaded from this machine.
    LocalFile,
    /// Recovered from the server without origin information.
    Unknown,
}

/// Lifecycle state of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted by the server, no progress seen yet.
    Pending,
    /// Progress messages are flowing.
    Running,
    /// Resume accepted by the server; waiting for the new channel.
    PendingResume,
    /// Transcript complete.
    Succeeded,
    /// Failed on the server or lost its channel.
    Failed,
    /// Cancelled by the user.
    Cancelled,
}

/// Who is asking for a status change. Decides which edges are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    /// Push messages and channel loss.
    Live,
    /// Explicit user resume.
    Resume,
    /// Authoritative job detail fetched from the server.
    Reconcile,
}

impl JobStatus {
    /// Map a server status string (`em_andamento`, `concluida`, ...) onto a status.
    #[must_use]
    pub fn from_server(raw: &str) -> Self {
        match raw.trim() {
            "em_andamento" | "processando" => Self::Running,
            "preparando_retomada" => Self::PendingResume,
            "concluida" => Self::Succeeded,
            "falha" => Self::Failed,
            "cancelada" => Self::Cancelled,
            _ => Self::Pending,
        }
    }

    /// Stable lowercase label used in logs and listings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::PendingResume => "pending_resume",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Work is still expected to happen on the server for this job.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Pending | Self::Running | Self::PendingResume)
    }

    /// Terminal from the point of view of the live channel.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> next` is a legal edge for `cause`.
    #[must_use]
    pub fn can_transition(self, next: Self, cause: TransitionCause) -> bool {
        if self == next {
            return true;
        }
        let live_edge = match self {
            Self::Pending | Self::PendingResume => matches!(
                next,
                Self::Running | Self::Succeeded | Self::Failed | Self::Cancelled
            ),
            Self::Running => matches!(next, Self::Succeeded | Self::Failed | Self::Cancelled),
            Self::Succeeded | Self::Failed | Self::Cancelled => false,
        };
        match cause {
            TransitionCause::Live => live_edge,
            TransitionCause::Resume => {
                live_edge
                    || (matches!(self, Self::Failed | Self::Cancelled)
                        && matches!(
                            next,
                            Self::PendingResume | Self::Running | Self::Succeeded
                        ))
            }
            TransitionCause::Reconcile => self != Self::Succeeded,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked transcription job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Server-assigned id.
    pub id: String,
    /// Source of the audio.
    pub kind: JobKind,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Display title (video title once known).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// File name or URL shown when no title is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    /// When the server accepted the job.
    pub started_at: DateTime<Utc>,
    /// Set on entry to a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// When this client first tracked the job; orders listings.
    pub tracked_at: DateTime<Utc>,
    /// 0..=100.
    #[serde(default)]
    pub progress_percent: u8,
    /// Accumulated transcript, partial while running.
    #[serde(default)]
    pub text: String,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Live-update channel id (`client_id`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_channel_id: Option<String>,
    /// Server-side progress caption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Processing time reported on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<String>,
}

impl Job {
    /// Title for listings: explicit title, else source name, else a kind-based fallback.
    #[must_use]
    pub fn display_title(&self) -> &str {
        if let Some(title) = self.title.as_deref().filter(|t| !t.trim().is_empty()) {
            return title;
        }
        if let Some(source) = self.source_name.as_deref().filter(|s| !s.trim().is_empty()) {
            return source;
        }
        match self.kind {
            JobKind::RemoteVideo { .. } => "Remote video",
            JobKind::LocalFile => "Local file",
            JobKind::Unknown => "Transcription",
        }
    }

    /// A transcript is available for download/TTS.
    #[must_use]
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Partial state merged into a job by [`crate::JobTracker::upsert`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobPatch {
    /// Kind; only used when the job is created.
    pub kind: Option<JobKind>,
    /// Requested status.
    pub status: Option<JobStatus>,
    /// New title.
    pub title: Option<String>,
    /// New source name.
    pub source_name: Option<String>,
    /// Server start time; only used when the job is created.
    pub started_at: Option<DateTime<Utc>>,
    /// New progress.
    pub progress_percent: Option<u8>,
    /// New transcript text. Empty text never replaces existing text.
    pub text: Option<String>,
    /// New error description.
    pub error: Option<String>,
    /// New channel id.
    pub push_channel_id: Option<String>,
    /// New progress caption.
    pub stage: Option<String>,
    /// Processing time.
    pub processing_time: Option<String>,
}

impl JobPatch {
    /// Patch that only requests a status.
    #[must_use]
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Builder: progress.
    #[must_use]
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress_percent = Some(progress);
        self
    }

    /// Builder: text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder: title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Builder: error.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Builder: channel id.
    #[must_use]
    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.push_channel_id = Some(channel_id.into());
        self
    }

    /// Builder: kind.
    #[must_use]
    pub fn with_kind(mut self, kind: JobKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Builder: source name.
    #[must_use]
    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    /// Builder: server start time.
    #[must_use]
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }
}

/// Clamp a raw progress value from the wire into 0..=100.
#[must_use]
pub fn clamp_progress(raw: f64) -> u8 {
    if raw.is_nan() || raw <= 0.0 {
        return 0;
    }
    if raw >= 100.0 {
        return 100;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = raw.floor() as u8;
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_edges_are_one_directional() {
        use JobStatus::*;
        assert!(Pending.can_transition(Running, TransitionCause::Live));
        assert!(Running.can_transition(Succeeded, TransitionCause::Live));
        assert!(!Succeeded.can_transition(Running, TransitionCause::Live));
        assert!(!Failed.can_transition(Running, TransitionCause::Live));
        assert!(!Cancelled.can_transition(Succeeded, TransitionCause::Live));
        assert!(!Running.can_transition(Pending, TransitionCause::Live));
    }

    #[test]
    fn resume_reopens_failed_and_cancelled_jobs() {
        use JobStatus::*;
        assert!(Failed.can_transition(PendingResume, TransitionCause::Resume));
        assert!(Failed.can_transition(Succeeded, TransitionCause::Resume));
        assert!(Cancelled.can_transition(Running, TransitionCause::Resume));
        assert!(!Succeeded.can_transition(Running, TransitionCause::Resume));
    }

    #[test]
    fn reconcile_never_leaves_succeeded() {
        use JobStatus::*;
        assert!(Succeeded.can_transition(Succeeded, TransitionCause::Reconcile));
        assert!(!Succeeded.can_transition(Failed, TransitionCause::Reconcile));
        assert!(Running.can_transition(Failed, TransitionCause::Reconcile));
    }

    #[test]
    fn server_status_strings_map_onto_statuses() {
        assert_eq!(JobStatus::from_server("em_andamento"), JobStatus::Running);
        assert_eq!(JobStatus::from_server("processando"), JobStatus::Running);
        assert_eq!(JobStatus::from_server("concluida"), JobStatus::Succeeded);
        assert_eq!(JobStatus::from_server("falha"), JobStatus::Failed);
        assert_eq!(JobStatus::from_server("cancelada"), JobStatus::Cancelled);
        assert_eq!(
            JobStatus::from_server("preparando_retomada"),
            JobStatus::PendingResume
        );
        assert_eq!(JobStatus::from_server("desconhecido"), JobStatus::Pending);
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(clamp_progress(-3.0), 0);
        assert_eq!(clamp_progress(f64::NAN), 0);
        assert_eq!(clamp_progress(42.9), 42);
        assert_eq!(clamp_progress(250.0), 100);
    }
}
