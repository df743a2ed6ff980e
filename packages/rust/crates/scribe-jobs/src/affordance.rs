//! Which user actions make sense for a job in its current state.

use serde::Serialize;

use crate::job::{Job, JobStatus};

/// Enabled actions for one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Affordances {
    /// Cancel the running transcription.
    pub cancel: bool,
    /// Resume an interrupted transcription.
    pub resume: bool,
    /// Save the transcript text.
    pub download: bool,
    /// Ask questions about the transcript.
    pub ask_ai: bool,
    /// Convert the transcript to speech.
    pub speak: bool,
    /// Synthesize the transcript with a cloned voice.
    pub clone_voice: bool,
}

impl Affordances {
    /// Derive actions from job state alone.
    #[must_use]
    pub fn for_job(job: &Job) -> Self {
        let has_text = job.has_text();
        Self {
            cancel: job.status.is_in_flight(),
            resume: job.status == JobStatus::Failed,
            download: has_text,
            ask_ai: job.status == JobStatus::Succeeded && has_text,
            speak: has_text,
            clone_voice: has_text,
        }
    }

    /// Nothing selected.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}
