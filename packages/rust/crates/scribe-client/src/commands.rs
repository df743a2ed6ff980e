use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use scribe_client::{HttpApi, ScribeSettings, Session, SessionOptions, WsConnector};
use scribe_jobs::{FileStore, JobEventBus, JobTracker};

use crate::cli::{Command, ModelAction};

type ClientSession = Session<FileStore>;

pub(crate) fn build_session(
    settings: &ScribeSettings,
    server: Option<&str>,
) -> anyhow::Result<ClientSession> {
    let base_url = server.unwrap_or_else(|| settings.base_url());
    let store = FileStore::in_dir(settings.store_dir(), settings.slot());
    tracing::debug!(store = %store.path().display(), base_url, "opening job store");
    let tracker = JobTracker::open(store, JobEventBus::new(settings.event_capacity()));
    let api = HttpApi::new(base_url, settings.request_timeout())
        .with_context(|| format!("invalid server url {base_url}"))?;
    let connector = WsConnector::new(base_url)
        .with_context(|| format!("invalid server url {base_url}"))?;
    Ok(Session::new(
        tracker,
        Arc::new(api),
        Arc::new(connector),
        SessionOptions {
            policy: settings.dispatch_policy(),
            history_limit: settings.history_limit(),
        },
    ))
}

pub(crate) async fn run_command(session: &mut ClientSession, command: Command) -> anyhow::Result<()> {
    match command {
        Command::SubmitUrl { url, detach } => {
            let job_id = session.submit_remote(&url).await?;
            println!("{job_id}");
            if !detach {
                follow(session).await?;
            }
        }
        Command::SubmitFile { path, detach } => {
            let job_id = session
                .submit_file(&path)
                .await
                .with_context(|| format!("failed to submit {}", path.display()))?;
            println!("{job_id}");
            if !detach {
                follow(session).await?;
            }
        }
        Command::List => {
            for job in session.jobs() {
                println!(
                    "{}\t{}\t{:>3}%\t{}\t{}",
                    job.id,
                    job.status,
                    job.progress_percent,
                    job.tracked_at.format("%Y-%m-%d %H:%M"),
                    job.display_title()
                );
            }
        }
        Command::Load { job_id } => {
            let job = session.load_job(&job_id).await?;
            session.detach();
            println!("{} [{}]", job.display_title(), job.status);
            if job.has_text() {
                println!("{}", job.text);
            }
        }
        Command::Resume { job_id } => {
            session.resume(&job_id).await?;
            follow(session).await?;
        }
        Command::Watch { job_id } => {
            session.load_job(&job_id).await?;
            if session.is_attached() {
                follow(session).await?;
            } else {
                print_status(session);
            }
        }
        Command::Ask { job_id, question } => {
            select_job(session, &job_id).await?;
            if let Some(answer) = session.ask(&question).await? {
                println!("{answer}");
            }
        }
        Command::Insights { job_id } => {
            if let Some(job_id) = job_id {
                select_job(session, &job_id).await?;
            }
            println!("{}", session.generate_insights().await?);
        }
        Command::Model { action } => match action {
            ModelAction::List => {
                for (name, description) in session.list_models().await? {
                    println!("{name}\t{description}");
                }
            }
            ModelAction::Change { name } => {
                session.change_model(&name).await?;
                println!("{}", session.view().status_line);
            }
        },
        Command::Speak { job_id, out } => {
            select_job(session, &job_id).await?;
            let audio = session.speak().await?;
            let name = audio
                .filename
                .as_deref()
                .and_then(|name| Path::new(name).file_name())
                .map_or_else(|| PathBuf::from(format!("audio_{job_id}.mp3")), PathBuf::from);
            let path = out.join(name);
            tokio::fs::create_dir_all(&out)
                .await
                .with_context(|| format!("failed to create {}", out.display()))?;
            tokio::fs::write(&path, &audio.bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{}", path.display());
        }
        Command::CloneVoice {
            job_id,
            sample,
            text,
        } => {
            select_job(session, &job_id).await?;
            let reply = session.clone_voice(&sample, text).await?;
            println!("{}", reply.file);
        }
        Command::DownloadAudio { job_id, out } => {
            select_job(session, &job_id).await?;
            let path = session.download_audio(&out).await?;
            println!("{}", path.display());
        }
        Command::Export { job_id, out } => {
            select_job(session, &job_id).await?;
            let path = session.export_transcript(&out).await?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

/// Load `job_id` as the current job without following its channel.
async fn select_job(session: &mut ClientSession, job_id: &str) -> anyhow::Result<()> {
    session
        .load_job(job_id)
        .await
        .with_context(|| format!("failed to load transcription {job_id}"))?;
    session.detach();
    Ok(())
}

/// Print progress until the channel closes. First Ctrl+C sends a cancel,
/// the second one stops following.
async fn follow(session: &mut ClientSession) -> anyhow::Result<()> {
    let mut last = (String::new(), None);
    let mut cancel_sent = false;
    loop {
        tokio::select! {
            more = session.pump() => {
                if !more {
                    break;
                }
                let view = session.view();
                let current = (view.status_line.clone(), view.progress);
                if current != last {
                    print_status(session);
                    last = current;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if cancel_sent || !session.cancel().await? {
                    break;
                }
                cancel_sent = true;
                eprintln!("cancellation requested; press Ctrl+C again to stop following");
            }
        }
    }
    print_status(session);
    if let Some(job) = session.current_job()
        && job.status.is_terminal()
        && job.has_text()
    {
        println!("{}", job.text);
    }
    Ok(())
}

fn print_status(session: &ClientSession) {
    let view = session.view();
    match view.progress {
        Some(progress) => eprintln!("[{progress:>3}%] {}", view.status_line),
        None => eprintln!("{}", view.status_line),
    }
}
