//! HTTP API of the transcription service.
//!
//! [`TranscriptionApi`] is the seam the session talks to; [`HttpApi`] is the
//! reqwest implementation. Tests substitute their own implementations.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use scribe_jobs::{JobKind, JobStatus};

use crate::error::ClientError;
use crate::observability::ClientLogEvent;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Server reply to a start request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartedJob {
    /// New job id.
    #[serde(rename = "transcricao_id")]
    pub job_id: String,
    /// Live-update channel id.
    pub client_id: String,
}

/// Authoritative job record from `GET /transcricao/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobDetail {
    /// Server status string (`em_andamento`, `concluida`, ...).
    #[serde(default)]
    pub status: Option<String>,
    /// Display title.
    #[serde(default, rename = "titulo")]
    pub title: Option<String>,
    /// Transcript so far.
    #[serde(default, rename = "texto")]
    pub text: Option<String>,
    /// Live-update channel id while the job runs.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Raw start timestamp; see [`JobDetail::started_at`].
    #[serde(default, rename = "iniciado_em")]
    pub started_at: Option<String>,
    /// Origin tag (`youtube`, `arquivo`, ...).
    #[serde(default, rename = "tipo")]
    pub origin: Option<String>,
    /// Video URL for remote jobs.
    #[serde(default)]
    pub url: Option<String>,
    /// Uploaded file name for local jobs.
    #[serde(default, rename = "nome_arquivo")]
    pub file_name: Option<String>,
    /// Server-side completion flag.
    #[serde(default, rename = "concluido")]
    pub finished: Option<bool>,
}

impl JobDetail {
    /// Status mapped onto the client lattice.
    #[must_use]
    pub fn job_status(&self) -> JobStatus {
        match self.status.as_deref() {
            Some(raw) => JobStatus::from_server(raw),
            None if self.finished == Some(true) => JobStatus::Succeeded,
            None => JobStatus::Pending,
        }
    }

    /// Kind derived from the origin tag.
    #[must_use]
    pub fn kind(&self) -> JobKind {
        match (self.origin.as_deref(), self.url.as_deref()) {
            (Some("youtube"), Some(url)) if !url.trim().is_empty() => JobKind::RemoteVideo {
                url: url.to_string(),
            },
            (Some("arquivo"), _) => JobKind::LocalFile,
            _ => JobKind::Unknown,
        }
    }

    /// Parsed start time. Accepts RFC 3339 and naive ISO timestamps (read as UTC).
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.started_at.as_deref()?.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Server reply to a resume request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResumeReply {
    /// `concluida` or `preparando_retomada`.
    pub status: String,
    /// New live-update channel id.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Final text when already complete.
    #[serde(default, rename = "texto")]
    pub text: Option<String>,
    /// Display title, when the server knows one.
    #[serde(default, rename = "titulo")]
    pub title: Option<String>,
    /// Partial text saved before the interruption.
    #[serde(default, rename = "texto_parcial")]
    pub partial_text: Option<String>,
    /// Server had partial progress saved.
    #[serde(default, rename = "progresso_anterior")]
    pub had_progress: Option<bool>,
    /// Human-readable note from the server.
    #[serde(default)]
    pub message: Option<String>,
}

impl ResumeReply {
    /// The job turned out to be complete already.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        JobStatus::from_server(&self.status) == JobStatus::Succeeded
    }
}

/// Voice-clone upload.
#[derive(Debug, Clone)]
pub struct CloneVoiceRequest {
    /// Name of the voice sample file.
    pub sample_name: String,
    /// Sample audio.
    pub sample: Vec<u8>,
    /// Text to synthesize.
    pub text: String,
    /// Job the text belongs to.
    pub job_id: String,
}

/// Reply to a voice-clone request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CloneReply {
    /// Server path of the generated audio.
    #[serde(rename = "arquivo")]
    pub file: String,
}

/// Synthesized speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    /// Encoded audio.
    pub bytes: Vec<u8>,
    /// Server file name from `Content-Disposition`, used to re-fetch it.
    pub filename: Option<String>,
}

#[derive(Deserialize)]
struct InsightsReply {
    #[serde(default)]
    insights: Option<String>,
}

#[derive(Deserialize)]
struct ModelsReply {
    #[serde(rename = "modelos")]
    models: BTreeMap<String, String>,
}

/// Operations the client needs from the transcription service.
#[async_trait]
pub trait TranscriptionApi: Send + Sync {
    /// Start transcribing a remote video.
    async fn start_remote(&self, url: &str) -> Result<StartedJob, ClientError>;

    /// Upload a local media file and start transcribing it.
    async fn start_upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<StartedJob, ClientError>;

    /// Fetch the authoritative job record.
    async fn job_detail(&self, job_id: &str) -> Result<JobDetail, ClientError>;

    /// Ask the server to resume an interrupted job.
    async fn resume(&self, job_id: &str) -> Result<ResumeReply, ClientError>;

    /// Generic insights for a job, or for the latest transcript when `None`.
    async fn insights(&self, job_id: Option<&str>) -> Result<String, ClientError>;

    /// Answer a question about a job's transcript.
    async fn ask(&self, job_id: &str, question: &str) -> Result<String, ClientError>;

    /// Synthesize text with a cloned voice.
    async fn clone_voice(&self, request: CloneVoiceRequest) -> Result<CloneReply, ClientError>;

    /// Download the cloned-voice audio of a job.
    async fn download_audio(&self, job_id: &str) -> Result<Vec<u8>, ClientError>;

    /// Download a previously synthesized audio file.
    async fn fetch_audio(&self, filename: &str) -> Result<Vec<u8>, ClientError>;

    /// Convert text to speech.
    async fn text_to_speech(&self, text: &str) -> Result<SpeechAudio, ClientError>;

    /// Available recognition models, name to description.
    async fn list_models(&self) -> Result<BTreeMap<String, String>, ClientError>;

    /// Switch the server's recognition model.
    async fn change_model(&self, name: &str) -> Result<(), ClientError>;
}

/// reqwest-backed [`TranscriptionApi`].
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpApi {
    /// Client for the service at `base_url` (`http` or `https`).
    ///
    /// # Errors
    /// [`ClientError::InvalidUrl`] for unparsable or non-HTTP URLs;
    /// [`ClientError::Transport`] when the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = parse_base_url(base_url)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Service root.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl TranscriptionApi for HttpApi {
    async fn start_remote(&self, url: &str) -> Result<StartedJob, ClientError> {
        let endpoint = self.endpoint(&["iniciar-transcricao-youtube"])?;
        tracing::debug!(
            event = ClientLogEvent::HttpRequest.as_str(),
            endpoint = %endpoint,
            "starting remote transcription"
        );
        send_json(self.client.post(endpoint).form(&[("url", url)])).await
    }

    async fn start_upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<StartedJob, ClientError> {
        let endpoint = self.endpoint(&["iniciar-transcricao-arquivo"])?;
        tracing::debug!(
            event = ClientLogEvent::HttpRequest.as_str(),
            endpoint = %endpoint,
            file_name,
            bytes = bytes.len(),
            "uploading file for transcription"
        );
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        send_json(self.client.post(endpoint).multipart(form)).await
    }

    async fn job_detail(&self, job_id: &str) -> Result<JobDetail, ClientError> {
        let endpoint = self.endpoint(&["transcricao", job_id])?;
        send_json(self.client.get(endpoint)).await
    }

    async fn resume(&self, job_id: &str) -> Result<ResumeReply, ClientError> {
        let endpoint = self.endpoint(&["retomar-transcricao", job_id])?;
        send_json(self.client.post(endpoint)).await
    }

    async fn insights(&self, job_id: Option<&str>) -> Result<String, ClientError> {
        let mut endpoint = self.endpoint(&["generate-insights"])?;
        if let Some(job_id) = job_id {
            endpoint
                .query_pairs_mut()
                .append_pair("transcricao_id", job_id);
        }
        let reply: InsightsReply = send_json(self.client.get(endpoint)).await?;
        Ok(reply.insights.unwrap_or_default())
    }

    async fn ask(&self, job_id: &str, question: &str) -> Result<String, ClientError> {
        let endpoint = self.endpoint(&["generate-insights"])?;
        let body = json!({ "transcricao_id": job_id, "pergunta": question });
        let reply: InsightsReply = send_json(self.client.post(endpoint).json(&body)).await?;
        Ok(reply.insights.unwrap_or_default())
    }

    async fn clone_voice(&self, request: CloneVoiceRequest) -> Result<CloneReply, ClientError> {
        let endpoint = self.endpoint(&["clonar-voz"])?;
        let sample = reqwest::multipart::Part::bytes(request.sample).file_name(request.sample_name);
        let form = reqwest::multipart::Form::new()
            .part("file", sample)
            .text("texto", request.text)
            .text("transcricao_id", request.job_id);
        send_json(self.client.post(endpoint).multipart(form)).await
    }

    async fn download_audio(&self, job_id: &str) -> Result<Vec<u8>, ClientError> {
        let endpoint = self.endpoint(&["download-audio", job_id])?;
        let (_, bytes) = send_bytes(self.client.get(endpoint)).await?;
        Ok(bytes)
    }

    async fn fetch_audio(&self, filename: &str) -> Result<Vec<u8>, ClientError> {
        let endpoint = self.endpoint(&["get-audio", filename])?;
        let (_, bytes) = send_bytes(self.client.get(endpoint)).await?;
        Ok(bytes)
    }

    async fn text_to_speech(&self, text: &str) -> Result<SpeechAudio, ClientError> {
        let endpoint = self.endpoint(&["text-to-speech", ""])?;
        let body = json!({ "text": text });
        let (headers, bytes) = send_bytes(self.client.post(endpoint).json(&body)).await?;
        let filename = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(content_disposition_filename);
        Ok(SpeechAudio { bytes, filename })
    }

    async fn list_models(&self) -> Result<BTreeMap<String, String>, ClientError> {
        let endpoint = self.endpoint(&["modelos"])?;
        let reply: ModelsReply = send_json(self.client.get(endpoint)).await?;
        Ok(reply.models)
    }

    async fn change_model(&self, name: &str) -> Result<(), ClientError> {
        let endpoint = self.endpoint(&["mudar-modelo", name])?;
        let _: Value = send_json(self.client.post(endpoint)).await?;
        Ok(())
    }
}

/// Parse and validate a service root URL.
///
/// # Errors
/// [`ClientError::InvalidUrl`] when unparsable or not `http(s)`.
pub fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw.trim())
        .map_err(|error| ClientError::InvalidUrl(format!("{raw}: {error}")))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(ClientError::InvalidUrl(raw.to_string())),
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
    let response = check(request.send().await?).await?;
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|error| ClientError::Decode(error.to_string()))
}

async fn send_bytes(request: RequestBuilder) -> Result<(HeaderMap, Vec<u8>), ClientError> {
    let response = check(request.send().await?).await?;
    let headers = response.headers().clone();
    let body = response.bytes().await?;
    Ok((headers, body.to_vec()))
}

async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = error_detail(&body)
        .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));
    tracing::debug!(
        event = ClientLogEvent::HttpError.as_str(),
        status = status.as_u16(),
        detail = %detail,
        "service returned an error"
    );
    Err(ClientError::Application {
        status: status.as_u16(),
        detail,
    })
}

fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) if !detail.trim().is_empty() => Some(detail.clone()),
        Value::Null | Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

/// File name from a `Content-Disposition` header value.
#[must_use]
pub fn content_disposition_filename(header: &str) -> Option<String> {
    let start = header.find("filename=")? + "filename=".len();
    let rest = &header[start..];
    let name = rest
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"');
    (!name.is_empty()).then(|| name.to_string())
}

/// Default request timeout as a [`Duration`].
#[must_use]
pub fn default_request_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
}
