#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use scribe_client::{
    ChannelConnector, ChannelPeer, ClientError, CloneReply, CloneVoiceRequest, JobDetail,
    LiveChannel, ResumeReply, Session, SessionOptions, SpeechAudio, StartedJob, TranscriptionApi,
};
use scribe_jobs::{JobEventBus, JobTracker, MemoryStore};

pub const REMOTE_JOB: &str = "t-remote";
pub const REMOTE_CHANNEL: &str = "c-remote";
pub const FILE_JOB: &str = "t-file";
pub const FILE_CHANNEL: &str = "c-file";

/// Scripted answer for `GET /transcricao/{id}`.
pub enum DetailReply {
    Found(JobDetail),
    Status(u16),
}

#[derive(Default)]
pub struct MockApi {
    details: Mutex<HashMap<String, DetailReply>>,
    resume_reply: Mutex<Option<ResumeReply>>,
    answers: Mutex<VecDeque<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn with_detail(self, id: &str, detail: JobDetail) -> Self {
        self.details
            .lock()
            .unwrap()
            .insert(id.to_string(), DetailReply::Found(detail));
        self
    }

    pub fn with_detail_status(self, id: &str, status: u16) -> Self {
        self.details
            .lock()
            .unwrap()
            .insert(id.to_string(), DetailReply::Status(status));
        self
    }

    pub fn with_resume(self, reply: ResumeReply) -> Self {
        *self.resume_reply.lock().unwrap() = Some(reply);
        self
    }

    pub fn with_answers(self, answers: &[&str]) -> Self {
        self.answers
            .lock()
            .unwrap()
            .extend(answers.iter().map(ToString::to_string));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

fn not_found() -> ClientError {
    ClientError::Application {
        status: 404,
        detail: "Transcrição não encontrada".to_string(),
    }
}

#[async_trait]
impl TranscriptionApi for MockApi {
    async fn start_remote(&self, url: &str) -> Result<StartedJob, ClientError> {
        self.record(format!("start_remote {url}"));
        Ok(StartedJob {
            job_id: REMOTE_JOB.to_string(),
            client_id: REMOTE_CHANNEL.to_string(),
        })
    }

    async fn start_upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<StartedJob, ClientError> {
        self.record(format!("start_upload {file_name} {}", bytes.len()));
        Ok(StartedJob {
            job_id: FILE_JOB.to_string(),
            client_id: FILE_CHANNEL.to_string(),
        })
    }

    async fn job_detail(&self, job_id: &str) -> Result<JobDetail, ClientError> {
        self.record(format!("job_detail {job_id}"));
        match self.details.lock().unwrap().get(job_id) {
            Some(DetailReply::Found(detail)) => Ok(detail.clone()),
            Some(DetailReply::Status(status)) => Err(ClientError::Application {
                status: *status,
                detail: format!("status {status}"),
            }),
            None => Err(not_found()),
        }
    }

    async fn resume(&self, job_id: &str) -> Result<ResumeReply, ClientError> {
        self.record(format!("resume {job_id}"));
        self.resume_reply.lock().unwrap().clone().ok_or_else(not_found)
    }

    async fn insights(&self, job_id: Option<&str>) -> Result<String, ClientError> {
        self.record(format!("insights {}", job_id.unwrap_or("-")));
        Ok("key points".to_string())
    }

    async fn ask(&self, job_id: &str, question: &str) -> Result<String, ClientError> {
        self.record(format!("ask {job_id} {question}"));
        Ok(self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "answer".to_string()))
    }

    async fn clone_voice(&self, request: CloneVoiceRequest) -> Result<CloneReply, ClientError> {
        self.record(format!("clone_voice {} {}", request.job_id, request.text));
        Ok(CloneReply {
            file: format!("static/audio/{}.wav", request.job_id),
        })
    }

    async fn download_audio(&self, job_id: &str) -> Result<Vec<u8>, ClientError> {
        self.record(format!("download_audio {job_id}"));
        Ok(b"RIFF".to_vec())
    }

    async fn fetch_audio(&self, filename: &str) -> Result<Vec<u8>, ClientError> {
        self.record(format!("fetch_audio {filename}"));
        Ok(b"ID3".to_vec())
    }

    async fn text_to_speech(&self, text: &str) -> Result<SpeechAudio, ClientError> {
        self.record(format!("text_to_speech {text}"));
        Ok(SpeechAudio {
            bytes: b"ID3".to_vec(),
            filename: Some("tts_1.mp3".to_string()),
        })
    }

    async fn list_models(&self) -> Result<BTreeMap<String, String>, ClientError> {
        Ok(BTreeMap::from([
            ("base".to_string(), "balanced".to_string()),
            ("tiny".to_string(), "fastest".to_string()),
        ]))
    }

    async fn change_model(&self, name: &str) -> Result<(), ClientError> {
        self.record(format!("change_model {name}"));
        Ok(())
    }
}

/// Connector handing out in-process channels; tests drive the peers.
#[derive(Default)]
pub struct ScriptedConnector {
    peers: Mutex<Vec<ChannelPeer>>,
    connects: Mutex<Vec<String>>,
    refuse: AtomicBool,
}

impl ScriptedConnector {
    pub fn refusing() -> Self {
        let connector = Self::default();
        connector.refuse.store(true, Ordering::SeqCst);
        connector
    }

    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }

    /// Peer of the most recent connection.
    pub fn take_peer(&self) -> ChannelPeer {
        self.peers.lock().unwrap().pop().expect("no channel was opened")
    }
}

#[async_trait]
impl ChannelConnector for ScriptedConnector {
    async fn connect(&self, client_id: &str) -> Result<LiveChannel, ClientError> {
        self.connects.lock().unwrap().push(client_id.to_string());
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ClientError::Channel("connection refused".to_string()));
        }
        let (channel, peer) = LiveChannel::pair(client_id, 16);
        self.peers.lock().unwrap().push(peer);
        Ok(channel)
    }
}

pub fn empty_tracker() -> JobTracker<MemoryStore> {
    JobTracker::open(MemoryStore::new(), JobEventBus::default())
}

pub fn session_with(
    tracker: JobTracker<MemoryStore>,
    api: &Arc<MockApi>,
    connector: &Arc<ScriptedConnector>,
) -> Session<MemoryStore> {
    Session::new(
        tracker,
        api.clone(),
        connector.clone(),
        SessionOptions::default(),
    )
}

pub fn finished_detail(text: &str) -> JobDetail {
    JobDetail {
        status: Some("concluida".to_string()),
        text: Some(text.to_string()),
        title: Some("Talk".to_string()),
        origin: Some("youtube".to_string()),
        url: Some("https://youtu.be/x".to_string()),
        finished: Some(true),
        ..JobDetail::default()
    }
}
