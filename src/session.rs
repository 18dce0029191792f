//! Mailbox session lifecycle
//!
//! [`MailboxProtocol`] is the capability a remote mailbox offers: the seven
//! operations one poll needs. [`MailboxSession`] drives a protocol through
//!
//! ```text
//! Disconnected -> Connected -> Authenticated -> FolderSelected -> Closed
//! ```
//!
//! rejecting out-of-order calls, classifying which failures end a run and
//! which do not, and making sure the protocol is closed at most once.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Protocol-assigned identifier of one message in the selected folder.
///
/// Only meaningful within the session that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A complete message (headers and body) as fetched.
pub type RawMessage = Vec<u8>;

/// Operations a remote mailbox endpoint supports.
#[async_trait]
pub trait MailboxProtocol: Send {
    /// Open a secure connection. `timeout` bounds this and every later
    /// operation.
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<()>;

    /// Log in. A rejection is [`Error::Auth`].
    async fn authenticate(&mut self, identity: &str, secret: &str) -> Result<()>;

    async fn select_folder(&mut self, name: &str) -> Result<()>;

    /// Identifiers of messages without the seen flag, in any order.
    async fn search_unseen(&mut self) -> Result<Vec<MessageId>>;

    /// Full message for `id`, or `None` if the server returned nothing
    /// (for instance because it was expunged after the search).
    async fn fetch(&mut self, id: MessageId) -> Result<Option<RawMessage>>;

    async fn set_seen_flag(&mut self, id: MessageId) -> Result<()>;

    /// Log out and release the connection.
    async fn close(&mut self) -> Result<()>;
}

/// Where a [`MailboxSession`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Authenticated,
    FolderSelected,
    Closed,
}

/// One connection to a mailbox, owned exclusively and torn down through
/// [`MailboxSession::close`].
pub struct MailboxSession<P: MailboxProtocol> {
    protocol: P,
    state: SessionState,
    folder: Option<String>,
    close_attempted: bool,
}

impl<P: MailboxProtocol> MailboxSession<P> {
    #[must_use]
    pub const fn new(protocol: P) -> Self {
        Self {
            protocol,
            state: SessionState::Disconnected,
            folder: None,
            close_attempted: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Name of the selected folder, once one is selected.
    #[must_use]
    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    /// Connect to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns a connection-class error on refusal, timeout or TLS
    /// failure, or [`Error::Protocol`] if the session is not fresh.
    pub async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        self.ensure_state(&[SessionState::Disconnected], "connect")?;
        self.protocol.connect(host, port, timeout).await?;
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Log in with `identity` and `secret`. No retry on rejection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the credentials are rejected.
    pub async fn authenticate(&mut self, identity: &str, secret: &str) -> Result<()> {
        self.ensure_state(&[SessionState::Connected], "authenticate")?;
        self.protocol.authenticate(identity, secret).await?;
        self.state = SessionState::Authenticated;
        debug!("Authenticated as {}", identity);
        Ok(())
    }

    /// Select the folder to poll.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the folder is missing or
    /// inaccessible.
    pub async fn select_folder(&mut self, name: &str) -> Result<()> {
        self.ensure_state(
            &[SessionState::Authenticated, SessionState::FolderSelected],
            "select a folder",
        )?;
        self.protocol.select_folder(name).await?;
        self.state = SessionState::FolderSelected;
        self.folder = Some(name.to_string());
        Ok(())
    }

    /// Unseen message identifiers in ascending order.
    ///
    /// A refused search yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns connection-class errors, or [`Error::Protocol`] if no
    /// folder is selected.
    pub async fn query_unseen(&mut self) -> Result<Vec<MessageId>> {
        self.ensure_state(&[SessionState::FolderSelected], "search")?;
        match self.protocol.search_unseen().await {
            Ok(mut ids) => {
                ids.sort_unstable();
                ids.dedup();
                Ok(ids)
            }
            Err(e) if !e.is_connection() => {
                warn!("Unseen search failed, treating as empty: {}", e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch one message; `None` means it is gone and should be skipped.
    ///
    /// # Errors
    ///
    /// Returns any fetch failure, or [`Error::Protocol`] if no folder is
    /// selected.
    pub async fn fetch(&mut self, id: MessageId) -> Result<Option<RawMessage>> {
        self.ensure_state(&[SessionState::FolderSelected], "fetch")?;
        self.protocol.fetch(id).await
    }

    /// Set the seen flag on `id`. Returns whether the flag was set.
    ///
    /// A refused store is logged and reported as `false` so the rest of
    /// the batch can continue.
    ///
    /// # Errors
    ///
    /// Returns connection-class errors, or [`Error::Protocol`] if no
    /// folder is selected.
    pub async fn mark_seen(&mut self, id: MessageId) -> Result<bool> {
        self.ensure_state(&[SessionState::FolderSelected], "mark a message seen")?;
        match self.protocol.set_seen_flag(id).await {
            Ok(()) => Ok(true),
            Err(e) if !e.is_connection() => {
                warn!("Failed to mark UID {} seen: {}", id, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Tear the session down. Only the first call does anything; a
    /// failure is logged and otherwise ignored.
    pub async fn close(&mut self) {
        if self.close_attempted {
            return;
        }
        self.close_attempted = true;

        if self.state != SessionState::Disconnected
            && let Err(e) = self.protocol.close().await
        {
            warn!("Failed to close mailbox session: {}", e);
        }
        self.state = SessionState::Closed;
        self.folder = None;
        debug!("Mailbox session closed");
    }

    fn ensure_state(&self, allowed: &[SessionState], action: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::Protocol(format!(
                "cannot {action} in state {:?}",
                self.state
            )))
        }
    }
}

impl<P: MailboxProtocol> Drop for MailboxSession<P> {
    fn drop(&mut self) {
        if !self.close_attempted && self.state != SessionState::Disconnected {
            warn!("Mailbox session dropped without close");
        }
    }
}
