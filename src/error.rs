//! Error types for inbox-relay

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Send error: {0}")]
    Send(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error means the transport itself is unusable.
    ///
    /// Protocol-level refusals (`NO`/`BAD`) leave the connection intact;
    /// everything in this class does not.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Tls(_) | Self::Io(_))
    }
}

/// Map an async-imap error onto the crate's error kinds.
pub(crate) fn from_imap(err: async_imap::error::Error, context: &str) -> Error {
    use async_imap::error::Error as ImapError;

    match err {
        ImapError::Io(e) => Error::Connection(format!("{context}: {e}")),
        ImapError::ConnectionLost => Error::Connection(format!("{context}: connection lost")),
        other => Error::Protocol(format!("{context}: {other}")),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
