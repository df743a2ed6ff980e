//! Client error types.
//!
//! Library code returns [`ClientError`]; the `scribe` binary wraps it in
//! `anyhow` with context.

use thiserror::Error;

/// Failures of HTTP calls, the live channel and session operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request never produced a response (connect, timeout, body read).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("server error ({status}): {detail}")]
    Application {
        /// HTTP status code.
        status: u16,
        /// The response `detail`, or a generic message.
        detail: String,
    },

    /// Success response with an unexpected body.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// Live-update channel could not be opened or written.
    #[error("live channel error: {0}")]
    Channel(String),

    /// Local file access.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Base URL cannot be turned into an HTTP or WebSocket endpoint.
    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    /// Operation needs a current job and there is none.
    #[error("no transcription selected")]
    NoActiveJob,

    /// Operation needs transcript text and the job has none.
    #[error("no transcript text available")]
    NoTranscript,

    /// No synthesized audio to fetch.
    #[error("no generated audio available")]
    NoAudio,

    /// Question was empty after trimming.
    #[error("question must not be empty")]
    EmptyQuestion,
}

impl ClientError {
    /// Message suitable for the status line.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Application { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Channel(error.to_string())
    }
}
