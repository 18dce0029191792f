#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

//! Run one poll cycle: relay unseen mail summaries, then exit.
//!
//! Always exits 0 so a scheduler never sees a failed run; problems are
//! logged to stderr.

use clap::Parser;
use inbox_relay::{CommandSink, ImapProtocol, PollCycle, Settings, StdoutSink};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "inbox-poll")]
#[command(about = "Relay summaries of unseen mail to a messaging channel")]
struct Args {
    /// Env file with MAIL_ADDRESS, MAIL_APP_PASSWORD and friends
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Print summaries to stdout instead of running the notifier
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args).await {
        error!("{:#}", e);
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let settings = Settings::load(args.env_file.as_deref())?;
    let protocol = ImapProtocol::from_config(&settings.imap);

    if args.dry_run {
        PollCycle::new(settings.imap, settings.poll, StdoutSink)
            .run_and_discard(protocol)
            .await;
    } else {
        let sink = CommandSink::from_config(&settings.notify)?;
        PollCycle::new(settings.imap, settings.poll, sink)
            .run_and_discard(protocol)
            .await;
    }
    Ok(())
}
