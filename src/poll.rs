//! One poll cycle: unseen mail in, summaries out.

use crate::config::{ImapConfig, PollOptions};
use crate::decode::DecodedSummary;
use crate::error::Result;
use crate::session::{MailboxProtocol, MailboxSession};
use crate::sink::NotificationSink;
use tracing::{debug, info, warn};

/// Counters for one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Unseen messages the search reported.
    pub found: usize,
    /// Messages fetched in this cycle's batch.
    pub fetched: usize,
    /// Batch entries that had disappeared by fetch time.
    pub skipped: usize,
    /// Summaries handed to the sink.
    pub notified: usize,
    /// Messages whose seen flag was set.
    pub marked: usize,
}

/// Fetches up to `batch_size` unseen messages, hands each summary to the
/// sink and then marks the message seen.
pub struct PollCycle<S> {
    imap: ImapConfig,
    options: PollOptions,
    sink: S,
}

impl<S: NotificationSink> PollCycle<S> {
    #[must_use]
    pub const fn new(imap: ImapConfig, options: PollOptions, sink: S) -> Self {
        Self {
            imap,
            options,
            sink,
        }
    }

    /// Run one cycle over a fresh connection made through `protocol`.
    ///
    /// The session is closed before returning, whatever happened.
    ///
    /// # Errors
    ///
    /// Returns the first connection, authentication or protocol error;
    /// remaining messages wait for the next cycle.
    pub async fn run<P: MailboxProtocol>(&self, protocol: P) -> Result<PollReport> {
        let mut session = MailboxSession::new(protocol);
        let outcome = self.drive(&mut session).await;
        session.close().await;
        outcome
    }

    /// Run one cycle and log instead of returning failures, for callers
    /// such as a scheduler that must never see an error.
    pub async fn run_and_discard<P: MailboxProtocol>(&self, protocol: P) {
        match self.run(protocol).await {
            Ok(report) => info!(
                "Poll finished: {} unseen, {} notified, {} skipped",
                report.found, report.notified, report.skipped
            ),
            Err(e) => warn!("Poll cycle abandoned: {}", e),
        }
    }

    async fn drive<P: MailboxProtocol>(&self, session: &mut MailboxSession<P>) -> Result<PollReport> {
        let mut report = PollReport::default();

        session
            .connect(&self.imap.host, self.imap.port, self.imap.timeout)
            .await?;
        session
            .authenticate(&self.imap.username, &self.imap.password)
            .await?;
        session.select_folder(&self.imap.folder).await?;

        let ids = session.query_unseen().await?;
        report.found = ids.len();
        if ids.is_empty() {
            debug!("No unseen messages in {}", self.imap.folder);
            return Ok(report);
        }

        let batch = &ids[..ids.len().min(self.options.batch_size)];
        if batch.len() < ids.len() {
            info!(
                "{} unseen messages, handling {} this cycle",
                ids.len(),
                batch.len()
            );
        }

        for &id in batch {
            let Some(raw) = session.fetch(id).await? else {
                debug!("UID {} vanished before fetch, skipping", id);
                report.skipped += 1;
                continue;
            };
            report.fetched += 1;

            let summary = DecodedSummary::from_raw(&raw, self.options.snippet_limit);
            self.sink.notify(&summary.render()).await;
            report.notified += 1;

            if session.mark_seen(id).await? {
                report.marked += 1;
            }
        }

        Ok(report)
    }
}
