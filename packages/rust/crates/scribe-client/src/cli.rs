use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "scribe")]
#[command(about = "Transcription client: submit jobs, follow live progress, resume, ask the AI.")]
pub(crate) struct Cli {
    /// Override config directory (settings are read from `<conf>/scribe/settings.yaml`).
    #[arg(long, global = true)]
    pub(crate) conf: Option<PathBuf>,

    /// Service root URL (overrides settings and SCRIBE_SERVER_URL).
    #[arg(long, global = true)]
    pub(crate) server: Option<String>,

    /// Debug logging for scribe crates (RUST_LOG still wins).
    #[arg(long, short, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Transcribe a remote video URL and follow its progress.
    SubmitUrl {
        url: String,

        /// Return after the job is accepted instead of following it.
        #[arg(long)]
        detach: bool,
    },
    /// Upload a local audio/video file and follow its progress.
    SubmitFile {
        path: PathBuf,

        /// Return after the job is accepted instead of following it.
        #[arg(long)]
        detach: bool,
    },
    /// List tracked jobs, most recent first.
    List,
    /// Fetch a job from the server and print its transcript.
    Load { job_id: String },
    /// Resume an interrupted job and follow it.
    Resume { job_id: String },
    /// Re-attach to a running job. Ctrl+C asks the server to cancel.
    Watch { job_id: String },
    /// Ask a question about a finished transcript.
    Ask { job_id: String, question: String },
    /// Generate insights for a transcript (default: the server's latest).
    Insights { job_id: Option<String> },
    /// List or switch recognition models.
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Convert a transcript to speech and save the audio.
    Speak {
        job_id: String,

        /// Output directory.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Synthesize text with the voice from a sample recording.
    CloneVoice {
        job_id: String,

        /// Voice sample (wav/mp3).
        #[arg(long)]
        sample: PathBuf,

        /// Text to speak (default: the transcript).
        #[arg(long)]
        text: Option<String>,
    },
    /// Download the cloned-voice audio of a job.
    DownloadAudio {
        job_id: String,

        /// Output directory.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Save a transcript as a text file.
    Export {
        job_id: String,

        /// Output directory.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
pub(crate) enum ModelAction {
    /// Show available models.
    List,
    /// Load another model on the server.
    Change { name: String },
}
