//! scribe CLI: submit transcriptions, follow live progress, resume, ask the AI.
//!
//! Jobs are remembered in `<PRJ_DATA_HOME>/scribe/transcricoes.json` (see `storage` in settings).
//!
//! Logging: set `RUST_LOG=scribe_client=debug,scribe_jobs=debug` to see channel traffic on stderr.

mod cli;
mod commands;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use scribe_client::{load_settings, set_config_home_override};

use crate::cli::Cli;
use crate::commands::{build_session, run_command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Some(conf_dir) = cli.conf.clone() {
        set_config_home_override(conf_dir);
    }

    // RUST_LOG overrides; --verbose => debug; else info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "scribe_client=debug,scribe_jobs=debug"
        } else {
            "scribe_client=info,scribe_jobs=info"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let settings = load_settings();
    let mut session =
        build_session(&settings, cli.server.as_deref()).context("failed to start client")?;
    run_command(&mut session, cli.command).await
}
