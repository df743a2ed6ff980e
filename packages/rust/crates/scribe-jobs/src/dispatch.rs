//! Live Update Dispatcher: pure projection of push messages onto job patches.
//!
//! Nothing here touches the tracker or the network. A [`Dispatch`] says which
//! job to patch and what the status line, progress bar and history should
//! show; the session applies it. All patches produced here use
//! [`TransitionCause::Live`](crate::TransitionCause::Live).

use serde::{Deserialize, Serialize};

use crate::error::MessageError;
use crate::history::{HistoryEntry, HistoryLevel};
use crate::job::{Job, JobPatch, JobStatus};
use crate::message::ServerMessage;
use crate::observability::JobLogEvent;

/// Close codes treated as a deliberate, normal shutdown (normal closure and
/// "no status received").
pub const NORMAL_CLOSE_CODES: [u16; 2] = [1000, 1005];

/// Progress shown for download/prepare messages without a value.
pub const DEFAULT_PREPARE_PROGRESS: u8 = 10;

const DEFAULT_FAILURE_TEXT: &str = "transcription failed on the server";

/// What to do when a partial result already reports 100%.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlyCompletion {
    /// Mark the job succeeded immediately.
    #[default]
    Adopt,
    /// Stay running until the explicit completion message.
    AwaitCompletion,
}

/// Knobs for [`dispatch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Handling of `progress >= 100` partial results.
    pub early_completion: EarlyCompletion,
}

/// Progress bar instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressDisplay {
    /// Show the bar at this percentage.
    Show(u8),
    /// Hide the bar.
    Hide,
}

/// Outcome of interpreting one channel event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    /// Job the patch applies to.
    pub target: Option<String>,
    /// State change for the target.
    pub patch: Option<JobPatch>,
    /// The patch may start tracking a job the client does not know yet. Only
    /// partial results do; other messages for unknown ids are dropped.
    pub creates_job: bool,
    /// New status line.
    pub status_line: Option<String>,
    /// Progress bar change.
    pub progress: Option<ProgressDisplay>,
    /// History lines to append.
    pub history: Vec<HistoryEntry>,
}

impl Dispatch {
    fn note(level: HistoryLevel, message: impl Into<String>) -> Self {
        Self {
            history: vec![HistoryEntry::new(level, message)],
            ..Self::default()
        }
    }

    fn for_job(target: Option<&str>, patch: JobPatch) -> Self {
        Self {
            target: target.map(ToString::to_string),
            patch: Some(patch),
            ..Self::default()
        }
    }

    fn status_line(mut self, line: impl Into<String>) -> Self {
        self.status_line = Some(line.into());
        self
    }

    fn progress(mut self, progress: ProgressDisplay) -> Self {
        self.progress = Some(progress);
        self
    }

    fn creating(mut self) -> Self {
        self.creates_job = true;
        self
    }

    fn log(mut self, level: HistoryLevel, message: impl Into<String>) -> Self {
        self.history.push(HistoryEntry::new(level, message));
        self
    }

    /// Whether the patch should be applied given the target's presence in the
    /// tracker.
    #[must_use]
    pub fn applies_to(&self, tracked: bool) -> bool {
        self.patch.is_some() && (tracked || self.creates_job)
    }

    /// Status this dispatch requests for its target.
    #[must_use]
    pub fn requested_status(&self) -> Option<JobStatus> {
        self.patch.as_ref().and_then(|patch| patch.status)
    }
}

/// Decode and interpret one raw text frame.
#[must_use]
pub fn dispatch_frame(raw: &str, attached_job: Option<&str>, policy: &DispatchPolicy) -> Dispatch {
    match ServerMessage::parse(raw) {
        Ok(message) => dispatch(&message, attached_job, policy),
        Err(error) => dispatch_malformed(raw, &error),
    }
}

/// Interpret one decoded message. Job-bound messages target their own
/// `transcricao_id`, falling back to the job attached to the channel.
#[must_use]
pub fn dispatch(
    message: &ServerMessage,
    attached_job: Option<&str>,
    policy: &DispatchPolicy,
) -> Dispatch {
    let target = message.job_id().or(attached_job);
    let dispatch = match message {
        ServerMessage::Status(note) => {
            let text = note.message.clone().unwrap_or_default();
            Dispatch::note(HistoryLevel::Info, format!("Status: {text}")).status_line(text)
        }
        ServerMessage::Downloading(update) | ServerMessage::Preparing(update) => {
            let progress = message.progress().unwrap_or(DEFAULT_PREPARE_PROGRESS);
            let caption = update.message.clone().unwrap_or_default();
            Dispatch::for_job(
                target,
                JobPatch::status(JobStatus::Running).with_progress(progress),
            )
            .status_line(caption.clone())
            .progress(ProgressDisplay::Show(progress))
            .log(HistoryLevel::Info, format!("Progress: {caption}"))
        }
        ServerMessage::PartialResult(partial) => {
            let progress = message.progress();
            let finished = progress.is_some_and(|p| p >= 100)
                && policy.early_completion == EarlyCompletion::Adopt;
            let status = if finished {
                JobStatus::Succeeded
            } else {
                JobStatus::Running
            };
            let patch = JobPatch {
                status: Some(status),
                progress_percent: progress,
                text: partial.text.clone(),
                title: partial.title.clone(),
                stage: partial.stage.clone(),
                processing_time: partial.processing_time.clone(),
                ..JobPatch::default()
            };
            let shown = progress.unwrap_or(0);
            let line = partial
                .stage
                .clone()
                .filter(|stage| !stage.trim().is_empty())
                .unwrap_or_else(|| format!("Progress: {shown}%"));
            Dispatch::for_job(target, patch)
                .creating()
                .status_line(line)
                .progress(ProgressDisplay::Show(shown))
                .log(HistoryLevel::Debug, format!("partial result {shown}%"))
        }
        ServerMessage::Completed(done) => {
            let patch = JobPatch {
                status: Some(JobStatus::Succeeded),
                progress_percent: Some(100),
                title: done.title.clone(),
                processing_time: done.processing_time.clone(),
                ..JobPatch::default()
            };
            Dispatch::for_job(target, patch)
                .status_line("Transcription complete")
                .progress(ProgressDisplay::Hide)
                .log(HistoryLevel::Success, "Transcription completed successfully")
        }
        ServerMessage::Error(failure) => {
            let reason = failure
                .message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FAILURE_TEXT.to_string());
            Dispatch::for_job(
                target,
                JobPatch::status(JobStatus::Failed).with_error(reason.clone()),
            )
            .status_line(format!("Error: {reason}"))
            .progress(ProgressDisplay::Hide)
            .log(HistoryLevel::Error, format!("Transcription error: {reason}"))
        }
        ServerMessage::Cancelled(_) => {
            Dispatch::for_job(target, JobPatch::status(JobStatus::Cancelled))
                .status_line("Transcription cancelled")
                .progress(ProgressDisplay::Hide)
                .log(HistoryLevel::Warning, "Transcription cancelled")
        }
        ServerMessage::Unknown { tag } => {
            tracing::warn!(
                event = JobLogEvent::UnknownMessage.as_str(),
                tag = %tag,
                "ignoring push message with unknown tag"
            );
            Dispatch::note(HistoryLevel::Warning, format!("Unknown message: {tag}"))
        }
    };

    if dispatch.patch.is_some() && dispatch.target.is_none() {
        tracing::warn!(
            tag = message.tag(),
            "push message has no job id and no job is attached; state untouched"
        );
        return Dispatch {
            target: None,
            patch: None,
            creates_job: false,
            ..dispatch
        };
    }
    dispatch
}

/// Interpret a frame that could not be decoded. Never changes state.
#[must_use]
pub fn dispatch_malformed(raw: &str, error: &MessageError) -> Dispatch {
    tracing::warn!(
        event = JobLogEvent::MalformedMessage.as_str(),
        error = %error,
        bytes = raw.len(),
        "ignoring malformed push message"
    );
    Dispatch::note(HistoryLevel::Error, format!("Channel message error: {error}"))
}

/// Close code is one of [`NORMAL_CLOSE_CODES`].
#[must_use]
pub fn is_normal_close(code: Option<u16>) -> bool {
    code.is_some_and(|code| NORMAL_CLOSE_CODES.contains(&code))
}

/// Connection-loss policy: an abnormal close while `job` is in flight fails it
/// with a resumable "connection lost" error. A normal close changes nothing.
#[must_use]
pub fn on_channel_closed(code: Option<u16>, job: Option<&Job>) -> Dispatch {
    let in_flight = job.filter(|job| job.status.is_in_flight());
    match in_flight {
        Some(job) if !is_normal_close(code) => {
            let reason = match code {
                Some(code) => format!("connection lost (code: {code})"),
                None => "connection lost (no close frame)".to_string(),
            };
            tracing::warn!(
                event = JobLogEvent::ConnectionLost.as_str(),
                job_id = %job.id,
                code = ?code,
                "live channel closed while job in flight"
            );
            Dispatch::for_job(
                Some(&job.id),
                JobPatch::status(JobStatus::Failed).with_error(reason),
            )
            .status_line("Connection lost. Use resume to continue.")
            .progress(ProgressDisplay::Hide)
            .log(HistoryLevel::Warning, "Live channel closed unexpectedly")
        }
        _ => Dispatch::note(HistoryLevel::Info, "Live channel closed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> DispatchPolicy {
        DispatchPolicy::default()
    }

    #[test]
    fn status_message_changes_display_only() {
        let d = dispatch_frame(r#"{"tipo":"status","mensagem":"Preparing audio"}"#, Some("t"), &policy());
        assert!(d.patch.is_none());
        assert_eq!(d.status_line.as_deref(), Some("Preparing audio"));
    }

    #[test]
    fn downloading_defaults_progress() {
        let d = dispatch_frame(r#"{"tipo":"baixando","mensagem":"Fetching"}"#, Some("t"), &policy());
        assert_eq!(d.target.as_deref(), Some("t"));
        assert_eq!(d.requested_status(), Some(JobStatus::Running));
        assert_eq!(d.patch.unwrap().progress_percent, Some(DEFAULT_PREPARE_PROGRESS));
    }

    #[test]
    fn partial_at_full_progress_follows_policy() {
        let raw = r#"{"tipo":"transcricao_parcial","texto":"all","progresso":100,"transcricao_id":"t"}"#;
        assert_eq!(
            dispatch_frame(raw, None, &policy()).requested_status(),
            Some(JobStatus::Succeeded)
        );
        let waiting = DispatchPolicy {
            early_completion: EarlyCompletion::AwaitCompletion,
        };
        assert_eq!(
            dispatch_frame(raw, None, &waiting).requested_status(),
            Some(JobStatus::Running)
        );
    }

    #[test]
    fn message_id_wins_over_attached_job() {
        let d = dispatch_frame(r#"{"tipo":"cancelada","transcricao_id":"other"}"#, Some("t"), &policy());
        assert_eq!(d.target.as_deref(), Some("other"));
    }

    #[test]
    fn unknown_and_malformed_frames_leave_state_alone() {
        let unknown = dispatch_frame(r#"{"tipo":"novidade"}"#, Some("t"), &policy());
        assert!(unknown.patch.is_none());
        assert_eq!(unknown.history[0].level, HistoryLevel::Warning);

        let malformed = dispatch_frame("{oops", Some("t"), &policy());
        assert!(malformed.patch.is_none());
        assert_eq!(malformed.history[0].level, HistoryLevel::Error);
    }

    #[test]
    fn job_message_without_any_target_is_dropped() {
        let d = dispatch_frame(r#"{"tipo":"erro","mensagem":"x"}"#, None, &policy());
        assert!(d.patch.is_none());
        assert!(d.target.is_none());
    }

    #[test]
    fn error_without_text_still_records_reason() {
        let d = dispatch_frame(r#"{"tipo":"erro"}"#, Some("t"), &policy());
        let error = d.patch.unwrap().error.unwrap();
        assert!(!error.is_empty());
    }

    #[test]
    fn only_partial_results_may_create_jobs() {
        let partial = dispatch_frame(
            r#"{"tipo":"transcricao_parcial","texto":"hi","progresso":5,"transcricao_id":"new"}"#,
            None,
            &policy(),
        );
        assert!(partial.applies_to(false));

        for raw in [
            r#"{"tipo":"transcricao_concluida","transcricao_id":"new"}"#,
            r#"{"tipo":"erro","mensagem":"x","transcricao_id":"new"}"#,
            r#"{"tipo":"cancelada","transcricao_id":"new"}"#,
            r#"{"tipo":"baixando","transcricao_id":"new"}"#,
        ] {
            let d = dispatch_frame(raw, None, &policy());
            assert!(!d.applies_to(false), "{raw}");
            assert!(d.applies_to(true), "{raw}");
        }
    }

    #[test]
    fn close_codes() {
        assert!(is_normal_close(Some(1000)));
        assert!(is_normal_close(Some(1005)));
        assert!(!is_normal_close(Some(1006)));
        assert!(!is_normal_close(None));
    }
}
