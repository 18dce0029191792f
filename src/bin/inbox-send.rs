#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

//! Send one plain-text email through the configured SMTP relay.

use clap::Parser;
use inbox_relay::{Mailer, Settings};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "inbox-send")]
#[command(about = "Send a plain-text email from MAIL_ADDRESS")]
struct Args {
    /// Env file with MAIL_ADDRESS, MAIL_APP_PASSWORD and friends
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Recipient address
    to: String,

    /// Subject line
    subject: String,

    /// Message body; multiple words are joined with spaces
    #[arg(required = true, num_args = 1..)]
    body: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = Settings::load(args.env_file.as_deref())?;
    let mailer = Mailer::from_config(&settings.smtp)?;

    mailer
        .send(&args.to, &args.subject, &args.body.join(" "))
        .await?;
    println!("OK");
    Ok(())
}
