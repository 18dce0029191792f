//! Notification delivery
//!
//! A [`NotificationSink`] takes finished summary text and delivers it
//! somewhere. Delivery is best-effort: sinks log their own failures and
//! never hand them back to the caller.

use crate::config::NotifyConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Best-effort delivery of one notification.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `text`. Must not fail and must return within a bounded
    /// time.
    async fn notify(&self, text: &str);
}

/// Runs an external notifier:
/// `<command> message send --channel <channel> --target <target> --message <text>`.
#[derive(Debug, Clone)]
pub struct CommandSink {
    program: String,
    channel: String,
    target: String,
    timeout: Duration,
}

impl CommandSink {
    /// Build a sink from notifier settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no `NOTIFY_TARGET` is configured.
    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        let target = config
            .target
            .clone()
            .ok_or_else(|| Error::Config("NOTIFY_TARGET not set".into()))?;

        Ok(Self {
            program: config.command.clone(),
            channel: config.channel.clone(),
            target,
            timeout: config.timeout,
        })
    }

    /// Arguments passed to the notifier for `text`.
    #[must_use]
    pub fn args(&self, text: &str) -> Vec<String> {
        [
            "message",
            "send",
            "--channel",
            self.channel.as_str(),
            "--target",
            self.target.as_str(),
            "--message",
            text,
        ]
        .iter()
        .map(ToString::to_string)
        .collect()
    }

    async fn run(&self, text: &str) -> std::io::Result<std::process::ExitStatus> {
        let mut child = Command::new(&self.program)
            .args(self.args(text))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        child.wait().await
    }
}

#[async_trait]
impl NotificationSink for CommandSink {
    async fn notify(&self, text: &str) {
        match tokio::time::timeout(self.timeout, self.run(text)).await {
            Ok(Ok(status)) if status.success() => {
                debug!("Notifier delivered summary to {}", self.target);
            }
            Ok(Ok(status)) => warn!("Notifier {} exited with {}", self.program, status),
            Ok(Err(e)) => warn!("Failed to run notifier {}: {}", self.program, e),
            Err(_) => warn!(
                "Notifier {} timed out after {}s",
                self.program,
                self.timeout.as_secs()
            ),
        }
    }
}

/// Prints summaries to stdout instead of notifying (dry runs).
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

#[async_trait]
impl NotificationSink for StdoutSink {
    async fn notify(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{text}\n") {
            warn!("Failed to print summary: {}", e);
        }
    }
}
