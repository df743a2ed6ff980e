//! Session controller.
//!
//! A [`Session`] owns the job tracker, the HTTP API, at most one live channel
//! and the [`ViewState`] a front end renders. Channel events are processed in
//! arrival order by [`Session::pump`]; every state change goes through the
//! tracker so persistence and notifications stay in one place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use scribe_jobs::{
    Affordances, ClientCommand, DEFAULT_HISTORY_LIMIT, Dispatch, DispatchPolicy, HistoryLevel,
    Job, JobKind, JobPatch, JobStatus, JobStore, JobTracker, ProgressDisplay, RequestGuard,
    RequestTicket, StatusHistory, TransitionCause, dispatch_frame, on_channel_closed,
};

use crate::api::{CloneReply, CloneVoiceRequest, SpeechAudio, TranscriptionApi};
use crate::channel::{ChannelConnector, ChannelEvent, LiveChannel};
use crate::error::ClientError;
use crate::observability::ClientLogEvent;

/// Title given to jobs recovered from the server without one.
pub const RECOVERED_TITLE: &str = "Recovered transcription";

const NO_ANSWER_TEXT: &str = "No answer received.";

/// Knobs for a [`Session`].
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Dispatcher behaviour.
    pub policy: DispatchPolicy,
    /// Retained status history entries.
    pub history_limit: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            policy: DispatchPolicy::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// What a front end shows. Derived from tracker state plus transient UI text.
#[derive(Debug, Clone)]
pub struct ViewState {
    /// One-line status shown above the progress bar.
    pub status_line: String,
    /// Progress bar value; `None` when hidden.
    pub progress: Option<u8>,
    /// Recent status lines.
    pub history: StatusHistory,
    /// Job shown in the detail pane.
    pub current_job: Option<String>,
    /// Display title of the current job.
    pub title: Option<String>,
    /// Transcript of the current job.
    pub transcript: String,
    /// Actions the current job offers.
    pub affordances: Affordances,
    /// Latest accepted AI answer, or its error text.
    pub ai_response: Option<String>,
    /// A question is waiting for its answer.
    pub ai_loading: bool,
    /// Generated insights for the current job.
    pub insights: Option<String>,
    /// File name of the last synthesized speech.
    pub last_audio: Option<String>,
}

impl ViewState {
    fn new(history_limit: usize) -> Self {
        Self {
            status_line: String::new(),
            progress: None,
            history: StatusHistory::new(history_limit),
            current_job: None,
            title: None,
            transcript: String::new(),
            affordances: Affordances::none(),
            ai_response: None,
            ai_loading: false,
            insights: None,
            last_audio: None,
        }
    }
}

/// How a resume request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Server already had the full transcript; no channel was opened.
    AlreadyComplete,
    /// Server restarted the job; a new channel is attached.
    Reconnecting,
}

/// Question issued but not answered yet. Send it without holding the session,
/// then hand the result to [`Session::apply_answer`].
pub struct PendingQuestion {
    ticket: RequestTicket,
    job_id: String,
    question: String,
    api: Arc<dyn TranscriptionApi>,
}

impl PendingQuestion {
    /// Sequence ticket of this question.
    #[must_use]
    pub fn ticket(&self) -> RequestTicket {
        self.ticket
    }

    /// Ask the server.
    ///
    /// # Errors
    /// Propagates API failures.
    pub async fn send(&self) -> Result<String, ClientError> {
        self.api.ask(&self.job_id, &self.question).await
    }
}

/// Interactive controller for one user.
pub struct Session<S: JobStore> {
    tracker: JobTracker<S>,
    api: Arc<dyn TranscriptionApi>,
    connector: Arc<dyn ChannelConnector>,
    policy: DispatchPolicy,
    guard: RequestGuard,
    view: ViewState,
    channel: Option<LiveChannel>,
    attached: Option<String>,
}

impl<S: JobStore> Session<S> {
    /// Build a session around an opened tracker.
    pub fn new(
        tracker: JobTracker<S>,
        api: Arc<dyn TranscriptionApi>,
        connector: Arc<dyn ChannelConnector>,
        options: SessionOptions,
    ) -> Self {
        Self {
            tracker,
            api,
            connector,
            policy: options.policy,
            guard: RequestGuard::new(),
            view: ViewState::new(options.history_limit),
            channel: None,
            attached: None,
        }
    }

    /// Current view.
    #[must_use]
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Tracked jobs.
    #[must_use]
    pub fn tracker(&self) -> &JobTracker<S> {
        &self.tracker
    }

    /// Jobs, most recent first.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> + '_ {
        self.tracker.list()
    }

    /// Job shown in the detail pane.
    #[must_use]
    pub fn current_job(&self) -> Option<&Job> {
        self.view
            .current_job
            .as_deref()
            .and_then(|id| self.tracker.get(id))
    }

    /// A live channel is open.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.channel.as_ref().is_some_and(LiveChannel::is_open)
    }

    /// Start transcribing a remote video and attach to its channel.
    ///
    /// # Errors
    /// Empty URL, API failure, or channel failure.
    pub async fn submit_remote(&mut self, url: &str) -> Result<String, ClientError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ClientError::InvalidUrl("video url is empty".to_string()));
        }
        self.note(HistoryLevel::Info, "Starting transcription...");
        let result = self.api.start_remote(url).await;
        let started = self.surface(result)?;
        let patch = JobPatch::status(JobStatus::Pending)
            .with_kind(JobKind::RemoteVideo {
                url: url.to_string(),
            })
            .with_source_name(url)
            .with_channel(started.client_id.clone());
        self.begin_job(&started.job_id, &started.client_id, patch)
            .await?;
        Ok(started.job_id)
    }

    /// Upload a local file and attach to its channel.
    ///
    /// # Errors
    /// File read failure, API failure, or channel failure.
    pub async fn submit_file(&mut self, path: &Path) -> Result<String, ClientError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let bytes = self.surface(tokio::fs::read(path).await.map_err(ClientError::from))?;
        self.note(HistoryLevel::Info, format!("Uploading {file_name}..."));
        let result = self.api.start_upload(&file_name, bytes).await;
        let started = self.surface(result)?;
        let patch = JobPatch::status(JobStatus::Pending)
            .with_kind(JobKind::LocalFile)
            .with_source_name(file_name)
            .with_channel(started.client_id.clone());
        self.begin_job(&started.job_id, &started.client_id, patch)
            .await?;
        Ok(started.job_id)
    }

    async fn begin_job(
        &mut self,
        job_id: &str,
        client_id: &str,
        patch: JobPatch,
    ) -> Result<(), ClientError> {
        tracing::info!(
            event = ClientLogEvent::JobSubmitted.as_str(),
            job_id,
            client_id,
            "transcription accepted"
        );
        self.detach();
        self.tracker.upsert(job_id, patch, TransitionCause::Live);
        self.select(job_id);
        self.view.progress = Some(0);
        self.attach(job_id, client_id).await.map(|_| ())
    }

    /// Fetch job `id` from the server and make it current.
    ///
    /// A 404 removes the stale local entry; other jobs are untouched. A job the
    /// server reports as running (or resuming) is re-attached when it has a
    /// channel id.
    ///
    /// # Errors
    /// API failure or channel failure.
    pub async fn load_job(&mut self, id: &str) -> Result<Job, ClientError> {
        self.note(HistoryLevel::Info, format!("Loading transcription {id}..."));
        let detail = match self.api.job_detail(id).await {
            Ok(detail) => detail,
            Err(error) => {
                if matches!(error, ClientError::Application { status: 404, .. })
                    && self.tracker.remove(id).is_some()
                {
                    tracing::info!(
                        event = ClientLogEvent::StaleJobRemoved.as_str(),
                        job_id = id,
                        "server no longer knows this job; removed local entry"
                    );
                    if self.view.current_job.as_deref() == Some(id) {
                        self.view.current_job = None;
                        self.refresh();
                    }
                }
                return Err(self.surface_error(error));
            }
        };

        let status = detail.job_status();
        let known = self.tracker.get(id).is_some();
        let mut patch = JobPatch::status(status).with_kind(detail.kind());
        patch.text.clone_from(&detail.text);
        patch.title = detail
            .title
            .clone()
            .or_else(|| (!known).then(|| RECOVERED_TITLE.to_string()));
        patch.source_name = detail.url.clone().or_else(|| detail.file_name.clone());
        patch.started_at = detail.started_at();
        patch.push_channel_id.clone_from(&detail.client_id);
        self.tracker.upsert(id, patch, TransitionCause::Reconcile);

        self.detach();
        self.select(id);
        let job = self
            .tracker
            .get(id)
            .cloned()
            .ok_or(ClientError::NoActiveJob)?;
        tracing::info!(
            event = ClientLogEvent::JobLoaded.as_str(),
            job_id = id,
            status = job.status.as_str(),
            "job loaded"
        );
        self.view.status_line = format!("Transcription {}", job.status);
        self.view.progress = job.status.is_in_flight().then_some(job.progress_percent);

        if matches!(job.status, JobStatus::Running | JobStatus::PendingResume)
            && let Some(client_id) = detail.client_id.filter(|c| !c.trim().is_empty())
        {
            self.attach(id, &client_id).await?;
        }
        Ok(job)
    }

    /// Open the live channel for `job_id`. No-op (`Ok(false)`) when a channel
    /// is already open. A connect failure is handled like an abnormal close.
    ///
    /// # Errors
    /// [`ClientError::Channel`] when the connection cannot be opened.
    pub async fn attach(&mut self, job_id: &str, client_id: &str) -> Result<bool, ClientError> {
        if self.is_attached() {
            tracing::debug!(
                event = ClientLogEvent::ChannelAlreadyOpen.as_str(),
                job_id,
                "live channel already open"
            );
            return Ok(false);
        }
        self.note(HistoryLevel::Info, "Connecting for live updates...");
        match self.connector.connect(client_id).await {
            Ok(channel) => {
                self.channel = Some(channel);
                self.attached = Some(job_id.to_string());
                self.note(HistoryLevel::Success, "Connected. Waiting for progress.");
                self.refresh();
                Ok(true)
            }
            Err(error) => {
                let closed = on_channel_closed(None, self.tracker.get(job_id));
                self.apply(closed);
                Err(self.surface_error(error))
            }
        }
    }

    /// Drop the live channel without touching job state.
    pub fn detach(&mut self) {
        if self.channel.take().is_some() {
            tracing::debug!(
                event = ClientLogEvent::ChannelClosed.as_str(),
                job_id = self.attached.as_deref().unwrap_or_default(),
                "live channel detached"
            );
        }
        self.attached = None;
        self.refresh();
    }

    /// Process the next channel event. `false` when no channel is open.
    pub async fn pump(&mut self) -> bool {
        let Some(channel) = self.channel.as_mut() else {
            return false;
        };
        let Some(event) = channel.next_event().await else {
            self.channel = None;
            self.attached = None;
            return false;
        };
        match event {
            ChannelEvent::Message(raw) => {
                let dispatch = dispatch_frame(&raw, self.attached.as_deref(), &self.policy);
                self.apply(dispatch);
            }
            ChannelEvent::Closed { code, reason } => {
                tracing::info!(
                    event = ClientLogEvent::ChannelClosed.as_str(),
                    job_id = self.attached.as_deref().unwrap_or_default(),
                    code = ?code,
                    reason = %reason,
                    "live channel closed"
                );
                let job = self.attached.as_deref().and_then(|id| self.tracker.get(id));
                let dispatch = on_channel_closed(code, job);
                self.channel = None;
                self.attached = None;
                self.apply(dispatch);
            }
        }
        true
    }

    /// Process channel events until the channel closes.
    pub async fn run_until_idle(&mut self) {
        while self.pump().await {}
    }

    /// Ask the server to cancel the attached job. `Ok(false)` when no channel
    /// is open.
    ///
    /// # Errors
    /// [`ClientError::Channel`] when the command cannot be written.
    pub async fn cancel(&mut self) -> Result<bool, ClientError> {
        let Some(channel) = self.channel.as_ref().filter(|channel| channel.is_open()) else {
            tracing::debug!(
                event = ClientLogEvent::CancelRequested.as_str(),
                "no open channel; cancel ignored"
            );
            return Ok(false);
        };
        let sent = channel.send(ClientCommand::Cancel).await;
        self.surface(sent)?;
        tracing::info!(
            event = ClientLogEvent::CancelRequested.as_str(),
            job_id = self.attached.as_deref().unwrap_or_default(),
            "cancel sent"
        );
        self.note(HistoryLevel::Warning, "Cancellation requested");
        Ok(true)
    }

    /// Resume an interrupted job.
    ///
    /// When the server reports the job complete, the text is adopted and no
    /// channel is opened. Otherwise the job moves to pending-resume, keeps any
    /// partial text and attaches to the new channel id. On failure the job is
    /// left as it was, so resume stays available.
    ///
    /// # Errors
    /// API failure, a reply without channel id, or channel failure.
    pub async fn resume(&mut self, id: &str) -> Result<ResumeOutcome, ClientError> {
        tracing::info!(
            event = ClientLogEvent::ResumeRequested.as_str(),
            job_id = id,
            "resuming transcription"
        );
        self.note(HistoryLevel::Info, "Resuming transcription...");
        let result = self.api.resume(id).await;
        let reply = self.surface(result)?;
        self.detach();
        self.select(id);

        if reply.is_finished() {
            let mut patch = JobPatch::status(JobStatus::Succeeded);
            patch.text = reply.text.or(reply.partial_text);
            patch.title = reply.title;
            self.tracker.upsert(id, patch, TransitionCause::Resume);
            self.refresh();
            tracing::info!(
                event = ClientLogEvent::ResumeFinished.as_str(),
                job_id = id,
                "job was already complete"
            );
            self.view.status_line = "Transcription already complete".to_string();
            self.view.progress = None;
            self.note(HistoryLevel::Success, "Transcription already complete");
            return Ok(ResumeOutcome::AlreadyComplete);
        }

        let Some(client_id) = reply.client_id.filter(|c| !c.trim().is_empty()) else {
            return Err(self.surface_error(ClientError::Decode(
                "resume reply has no client_id".to_string(),
            )));
        };
        let mut patch = JobPatch::status(JobStatus::PendingResume).with_channel(client_id.clone());
        patch.text = reply.partial_text;
        patch.title = reply.title;
        self.tracker.upsert(id, patch, TransitionCause::Resume);
        if reply.had_progress == Some(true) {
            self.note(HistoryLevel::Info, "Continuing from saved progress");
        }
        self.view.status_line = "Resuming transcription...".to_string();
        self.attach(id, &client_id).await?;
        Ok(ResumeOutcome::Reconnecting)
    }

    /// Issue a question about the current job. Supersedes earlier questions.
    ///
    /// # Errors
    /// [`ClientError::EmptyQuestion`], [`ClientError::NoActiveJob`], or
    /// [`ClientError::NoTranscript`] when the current job has no text yet.
    pub fn prepare_question(&mut self, question: &str) -> Result<PendingQuestion, ClientError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ClientError::EmptyQuestion);
        }
        self.current_text()?;
        let job_id = self
            .view
            .current_job
            .clone()
            .ok_or(ClientError::NoActiveJob)?;
        let ticket = self.guard.issue();
        tracing::debug!(
            event = ClientLogEvent::QuestionAsked.as_str(),
            job_id = %job_id,
            ticket = ticket.seq(),
            "question issued"
        );
        self.view.ai_loading = true;
        self.note(HistoryLevel::Info, format!("Asking: \"{question}\""));
        Ok(PendingQuestion {
            ticket,
            job_id,
            question: question.to_string(),
            api: Arc::clone(&self.api),
        })
    }

    /// Apply an answer. Answers to superseded questions are discarded and
    /// return `Ok(None)`.
    ///
    /// # Errors
    /// The question's own failure, when it is still current.
    pub fn apply_answer(
        &mut self,
        pending: &PendingQuestion,
        result: Result<String, ClientError>,
    ) -> Result<Option<String>, ClientError> {
        let Some(result) = self.guard.accept(pending.ticket, result) else {
            self.note(
                HistoryLevel::Warning,
                format!("Ignored answer to superseded question #{}", pending.ticket.seq()),
            );
            return Ok(None);
        };
        self.view.ai_loading = false;
        match result {
            Ok(answer) => {
                let answer = if answer.trim().is_empty() {
                    NO_ANSWER_TEXT.to_string()
                } else {
                    answer
                };
                self.view.ai_response = Some(answer.clone());
                self.note(HistoryLevel::Success, "AI answer received");
                Ok(Some(answer))
            }
            Err(error) => {
                self.view.ai_response = Some(format!("Error: {}", error.user_message()));
                self.note(
                    HistoryLevel::Error,
                    format!("AI answer failed: {}", error.user_message()),
                );
                Err(error)
            }
        }
    }

    /// Ask a question and apply the answer.
    ///
    /// # Errors
    /// See [`Self::prepare_question`] and [`Self::apply_answer`].
    pub async fn ask(&mut self, question: &str) -> Result<Option<String>, ClientError> {
        let pending = self.prepare_question(question)?;
        let result = pending.send().await;
        self.apply_answer(&pending, result)
    }

    /// Generic insights for the current job (or the server's latest transcript).
    ///
    /// # Errors
    /// API failure.
    pub async fn generate_insights(&mut self) -> Result<String, ClientError> {
        self.view.status_line = "Generating insights...".to_string();
        let job_id = self.view.current_job.clone();
        let result = self.api.insights(job_id.as_deref()).await;
        let insights = self.surface(result)?;
        self.view.insights = Some(insights.clone());
        self.view.status_line = "Insights generated".to_string();
        Ok(insights)
    }

    /// Available recognition models.
    ///
    /// # Errors
    /// API failure.
    pub async fn list_models(&mut self) -> Result<BTreeMap<String, String>, ClientError> {
        let result = self.api.list_models().await;
        self.surface(result)
    }

    /// Switch the server's recognition model.
    ///
    /// # Errors
    /// API failure.
    pub async fn change_model(&mut self, name: &str) -> Result<(), ClientError> {
        self.note(HistoryLevel::Info, format!("Loading model {name}..."));
        let result = self.api.change_model(name).await;
        self.surface(result)?;
        self.view.status_line = format!("Model {name} loaded");
        self.note(HistoryLevel::Success, format!("Model {name} loaded"));
        Ok(())
    }

    /// Convert the current transcript to speech.
    ///
    /// # Errors
    /// No transcript, or API failure.
    pub async fn speak(&mut self) -> Result<SpeechAudio, ClientError> {
        let text = self.current_text()?;
        self.view.status_line = "Generating audio...".to_string();
        let result = self.api.text_to_speech(&text).await;
        let audio = self.surface(result)?;
        self.view.last_audio.clone_from(&audio.filename);
        self.view.status_line = "Audio generated".to_string();
        Ok(audio)
    }

    /// Synthesize `text` (default: the current transcript) with the voice in
    /// `sample`.
    ///
    /// # Errors
    /// No current job or text, sample read failure, or API failure.
    pub async fn clone_voice(
        &mut self,
        sample: &Path,
        text: Option<String>,
    ) -> Result<CloneReply, ClientError> {
        let job_id = self
            .view
            .current_job
            .clone()
            .ok_or(ClientError::NoActiveJob)?;
        let text = match text.filter(|t| !t.trim().is_empty()) {
            Some(text) => text,
            None => self.current_text()?,
        };
        let bytes = self.surface(tokio::fs::read(sample).await.map_err(ClientError::from))?;
        let sample_name = sample
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sample.wav".to_string());
        self.view.status_line = "Generating audio with your voice...".to_string();
        let result = self
            .api
            .clone_voice(CloneVoiceRequest {
                sample_name,
                sample: bytes,
                text,
                job_id,
            })
            .await;
        let reply = self.surface(result)?;
        self.note(HistoryLevel::Success, "Cloned-voice audio generated");
        Ok(reply)
    }

    /// Save the cloned-voice audio of the current job into `dir`.
    ///
    /// # Errors
    /// No current job, API failure, or write failure.
    pub async fn download_audio(&mut self, dir: &Path) -> Result<PathBuf, ClientError> {
        let job_id = self
            .view
            .current_job
            .clone()
            .ok_or(ClientError::NoActiveJob)?;
        let result = self.api.download_audio(&job_id).await;
        let bytes = self.surface(result)?;
        let path = dir.join(format!("audio_clonado_{job_id}.wav"));
        self.surface(write_file(&path, &bytes).await)?;
        Ok(path)
    }

    /// Save synthesized speech `filename` (default: the last one) into `dir`.
    ///
    /// # Errors
    /// No audio generated yet, API failure, or write failure.
    pub async fn fetch_audio(
        &mut self,
        filename: Option<&str>,
        dir: &Path,
    ) -> Result<PathBuf, ClientError> {
        let filename = filename
            .map(ToString::to_string)
            .or_else(|| self.view.last_audio.clone())
            .ok_or(ClientError::NoAudio)?;
        let result = self.api.fetch_audio(&filename).await;
        let bytes = self.surface(result)?;
        let local_name = Path::new(&filename)
            .file_name()
            .map_or_else(|| "audio.mp3".into(), std::ffi::OsStr::to_os_string);
        let path = dir.join(local_name);
        self.surface(write_file(&path, &bytes).await)?;
        Ok(path)
    }

    /// Write the current transcript to `dir/transcricao_<millis>.txt`.
    ///
    /// # Errors
    /// No transcript, or write failure.
    pub async fn export_transcript(&mut self, dir: &Path) -> Result<PathBuf, ClientError> {
        let text = self.current_text()?;
        let path = dir.join(format!("transcricao_{}.txt", Utc::now().timestamp_millis()));
        self.surface(write_file(&path, text.as_bytes()).await)?;
        tracing::info!(
            event = ClientLogEvent::TranscriptExported.as_str(),
            path = %path.display(),
            bytes = text.len(),
            "transcript exported"
        );
        self.note(HistoryLevel::Success, "Transcript saved");
        Ok(path)
    }

    fn current_text(&self) -> Result<String, ClientError> {
        let job = self.current_job().ok_or(ClientError::NoActiveJob)?;
        if !job.has_text() {
            return Err(ClientError::NoTranscript);
        }
        Ok(job.text.clone())
    }

    fn select(&mut self, id: &str) {
        if self.view.current_job.as_deref() != Some(id) {
            self.view.ai_response = None;
            self.view.ai_loading = false;
            self.view.insights = None;
        }
        self.view.current_job = Some(id.to_string());
        self.refresh();
    }

    fn apply(&mut self, dispatch: Dispatch) {
        let tracked = dispatch
            .target
            .as_deref()
            .is_some_and(|id| self.tracker.get(id).is_some());
        let applies = dispatch.applies_to(tracked);
        let Dispatch {
            target,
            patch,
            status_line,
            progress,
            history,
            ..
        } = dispatch;
        let shown = target.is_none() || target == self.view.current_job;
        if let (Some(target), Some(patch)) = (target.as_deref(), patch) {
            if applies {
                self.tracker.upsert(target, patch, TransitionCause::Live);
            } else {
                tracing::warn!(
                    event = ClientLogEvent::UntrackedJobIgnored.as_str(),
                    job_id = target,
                    status = ?patch.status,
                    "push message for an untracked job; ignored"
                );
                return;
            }
        }
        if shown {
            if let Some(line) = status_line {
                self.view.status_line = line;
            }
            match progress {
                Some(ProgressDisplay::Show(value)) => self.view.progress = Some(value),
                Some(ProgressDisplay::Hide) => self.view.progress = None,
                None => {}
            }
        }
        for entry in history {
            self.view.history.push(entry);
        }
        self.refresh();
    }

    fn refresh(&mut self) {
        let attached = self.is_attached();
        let job = self
            .view
            .current_job
            .as_deref()
            .and_then(|id| self.tracker.get(id));
        match job {
            Some(job) => {
                self.view.title = Some(job.display_title().to_string());
                self.view.transcript.clone_from(&job.text);
                let mut affordances = Affordances::for_job(job);
                affordances.cancel &= attached;
                self.view.affordances = affordances;
            }
            None => {
                self.view.title = None;
                self.view.transcript.clear();
                self.view.affordances = Affordances::none();
            }
        }
    }

    fn note(&mut self, level: HistoryLevel, message: impl Into<String>) {
        self.view.history.record(level, message);
    }

    fn surface<T>(&mut self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        result.map_err(|error| self.surface_error(error))
    }

    fn surface_error(&mut self, error: ClientError) -> ClientError {
        let message = error.user_message();
        self.view.status_line = format!("Error: {message}");
        self.view.progress = None;
        self.note(HistoryLevel::Error, message);
        error
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ClientError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
