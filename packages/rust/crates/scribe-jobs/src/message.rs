//! Live-update channel wire format.
//!
//! Inbound frames are JSON objects tagged by `tipo`. Decoding is two-step so an
//! unknown tag is reported as [`ServerMessage::Unknown`] instead of an error:
//! newer servers may add tags and those must never corrupt job state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MessageError;
use crate::job::clamp_progress;

/// Fields shared by the download/prepare progress messages.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgressUpdate {
    /// Human-readable caption.
    #[serde(default, rename = "mensagem")]
    pub message: Option<String>,
    /// Raw progress value.
    #[serde(default, rename = "progresso")]
    pub progress: Option<f64>,
    /// Target job.
    #[serde(default, rename = "transcricao_id")]
    pub job_id: Option<String>,
}

/// Partial transcript push.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PartialResult {
    /// Transcript so far.
    #[serde(default, rename = "texto")]
    pub text: Option<String>,
    /// Raw progress value.
    #[serde(default, rename = "progresso")]
    pub progress: Option<f64>,
    /// Target job.
    #[serde(default, rename = "transcricao_id")]
    pub job_id: Option<String>,
    /// Media title.
    #[serde(default, rename = "titulo")]
    pub title: Option<String>,
    /// Progress caption.
    #[serde(default, rename = "etapa")]
    pub stage: Option<String>,
    /// Elapsed processing time.
    #[serde(default, rename = "tempo_processamento")]
    pub processing_time: Option<String>,
}

/// Completion push.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Completion {
    /// Target job.
    #[serde(default, rename = "transcricao_id")]
    pub job_id: Option<String>,
    /// Media title.
    #[serde(default, rename = "titulo")]
    pub title: Option<String>,
    /// Total processing time.
    #[serde(default, rename = "tempo_processamento")]
    pub processing_time: Option<String>,
}

/// Failure push.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Failure {
    /// Failure description.
    #[serde(default, rename = "mensagem")]
    pub message: Option<String>,
    /// Target job.
    #[serde(default, rename = "transcricao_id")]
    pub job_id: Option<String>,
}

/// Cancellation acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Cancellation {
    /// Target job.
    #[serde(default, rename = "transcricao_id")]
    pub job_id: Option<String>,
}

/// Plain status caption.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusNote {
    /// Caption text.
    #[serde(default, rename = "mensagem")]
    pub message: Option<String>,
}

/// One decoded inbound push message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// `status`: caption only.
    Status(StatusNote),
    /// `baixando`: server is fetching remote media.
    Downloading(ProgressUpdate),
    /// `preparando`: server is preparing audio.
    Preparing(ProgressUpdate),
    /// `transcricao_parcial`.
    PartialResult(PartialResult),
    /// `transcricao_concluida`, or a bare `concluida` replay.
    Completed(Completion),
    /// `erro`, or a bare `falha` replay.
    Error(Failure),
    /// `cancelada`.
    Cancelled(Cancellation),
    /// Any other tag.
    Unknown {
        /// The unrecognized `tipo` value.
        tag: String,
    },
}

impl ServerMessage {
    /// Decode one text frame.
    ///
    /// # Errors
    /// [`MessageError::Malformed`] for non-JSON or non-object payloads and for
    /// known tags whose fields have the wrong types; [`MessageError::MissingTag`]
    /// when `tipo` is absent.
    pub fn parse(raw: &str) -> Result<Self, MessageError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| MessageError::Malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(MessageError::Malformed("expected a JSON object".to_string()));
        }
        let tag = value
            .get("tipo")
            .and_then(Value::as_str)
            .ok_or(MessageError::MissingTag)?
            .to_string();

        let message = match tag.as_str() {
            "status" => Self::Status(decode(value)?),
            "baixando" => Self::Downloading(decode(value)?),
            "preparando" => Self::Preparing(decode(value)?),
            "transcricao_parcial" => Self::PartialResult(decode(value)?),
            "transcricao_concluida" | "concluida" => Self::Completed(decode(value)?),
            "erro" | "falha" => Self::Error(decode(value)?),
            "cancelada" => Self::Cancelled(decode(value)?),
            _ => Self::Unknown { tag },
        };
        Ok(message)
    }

    /// Wire tag for logs.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Status(_) => "status",
            Self::Downloading(_) => "baixando",
            Self::Preparing(_) => "preparando",
            Self::PartialResult(_) => "transcricao_parcial",
            Self::Completed(_) => "transcricao_concluida",
            Self::Error(_) => "erro",
            Self::Cancelled(_) => "cancelada",
            Self::Unknown { tag } => tag,
        }
    }

    /// Job id carried by the message, if any.
    #[must_use]
    pub fn job_id(&self) -> Option<&str> {
        let id = match self {
            Self::Downloading(update) | Self::Preparing(update) => update.job_id.as_deref(),
            Self::PartialResult(partial) => partial.job_id.as_deref(),
            Self::Completed(done) => done.job_id.as_deref(),
            Self::Error(failure) => failure.job_id.as_deref(),
            Self::Cancelled(cancel) => cancel.job_id.as_deref(),
            Self::Status(_) | Self::Unknown { .. } => None,
        };
        id.filter(|id| !id.trim().is_empty())
    }

    /// Clamped progress, for messages that carry one.
    #[must_use]
    pub fn progress(&self) -> Option<u8> {
        match self {
            Self::Downloading(update) | Self::Preparing(update) => {
                update.progress.map(clamp_progress)
            }
            Self::PartialResult(partial) => partial.progress.map(clamp_progress),
            _ => None,
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T, MessageError> {
    serde_json::from_value(value).map_err(|e| MessageError::Malformed(e.to_string()))
}

/// Outbound command on the live-update channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "acao", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Ask the server to cancel the attached job.
    #[serde(rename = "cancelar")]
    Cancel,
}

impl ClientCommand {
    /// JSON text frame.
    #[must_use]
    pub fn to_frame(self) -> String {
        match self {
            Self::Cancel => r#"{"acao":"cancelar"}"#.to_string(),
        }
    }
}
