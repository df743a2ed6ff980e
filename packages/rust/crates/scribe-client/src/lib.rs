//! Transcription service client.
//!
//! - [`HttpApi`]: request/response endpoints (start, detail, resume, AI, audio, models).
//! - [`WsConnector`]: live-update channel per job (`/ws/{client_id}`).
//! - [`Session`]: ties both to a [`scribe_jobs::JobTracker`] and keeps the view state.
//!
//! Logging: set `RUST_LOG=scribe_client=debug` to see channel and HTTP traffic on stderr.

#![allow(missing_docs)]

mod api;
mod channel;
mod error;
mod observability;
mod session;
mod settings;

pub use api::{
    CloneReply, CloneVoiceRequest, DEFAULT_REQUEST_TIMEOUT_SECS, HttpApi, JobDetail, ResumeReply,
    SpeechAudio, StartedJob, TranscriptionApi, content_disposition_filename,
    default_request_timeout, parse_base_url,
};
pub use channel::{
    ChannelConnector, ChannelEvent, ChannelPeer, DEFAULT_CHANNEL_CAPACITY, LiveChannel,
    WsConnector,
};
pub use error::ClientError;
pub use observability::ClientLogEvent;
pub use session::{
    PendingQuestion, RECOVERED_TITLE, ResumeOutcome, Session, SessionOptions, ViewState,
};
pub use settings::{
    DEFAULT_SERVER_URL, LiveSettings, SERVER_URL_ENV, STORE_PATH_ENV, ScribeSettings,
    ServerSettings, StorageSettings, load_settings, load_settings_from_paths,
    set_config_home_override, settings_paths,
};
