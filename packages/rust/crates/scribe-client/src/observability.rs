//! Structured log event names for the client.

/// Value of the `event` field on client log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientLogEvent {
    HttpRequest,
    HttpError,
    ChannelOpened,
    ChannelClosed,
    ChannelSendFailed,
    ChannelAlreadyOpen,
    JobSubmitted,
    JobLoaded,
    StaleJobRemoved,
    UntrackedJobIgnored,
    ResumeRequested,
    ResumeFinished,
    CancelRequested,
    QuestionAsked,
    TranscriptExported,
    SettingsLoaded,
}

impl ClientLogEvent {
    /// Stable dotted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HttpRequest => "client.http.request",
            Self::HttpError => "client.http.error",
            Self::ChannelOpened => "client.channel.opened",
            Self::ChannelClosed => "client.channel.closed",
            Self::ChannelSendFailed => "client.channel.send_failed",
            Self::ChannelAlreadyOpen => "client.channel.already_open",
            Self::JobSubmitted => "client.job.submitted",
            Self::JobLoaded => "client.job.loaded",
            Self::StaleJobRemoved => "client.job.stale_removed",
            Self::UntrackedJobIgnored => "client.job.untracked_ignored",
            Self::ResumeRequested => "client.resume.requested",
            Self::ResumeFinished => "client.resume.finished",
            Self::CancelRequested => "client.cancel.requested",
            Self::QuestionAsked => "client.ai.question_asked",
            Self::TranscriptExported => "client.transcript.exported",
            Self::SettingsLoaded => "client.settings.loaded",
        }
    }
}
