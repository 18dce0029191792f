//! Mailbox-to-chat relay
//!
//! Polls an IMAP folder for unseen messages, turns each one into a short
//! plain-text summary (sender, subject, body snippet), hands the summary
//! to a [`NotificationSink`] and marks the message seen. At most
//! [`PollOptions::batch_size`] messages are handled per cycle; the rest
//! wait for the next one.
//!
//! A [`Mailer`] covers the outbound direction over SMTP.

mod config;
mod decode;
mod error;
mod imap;
mod poll;
mod send;
mod session;
mod sink;


pub use config::{
    DEFAULT_ENV_FILE, ENV_FILE_VAR, ImapConfig, LEGACY_ENV_FILE_VAR, NotifyConfig, PollOptions,
    Settings, SmtpConfig, TlsMode, load_env_file, merge_first_wins,
};
pub use decode::{
    DecodedSummary, ELLIPSIS, collapse_whitespace, decode_header, extract_snippet, truncate,
};
pub use error::{Error, Result};
pub use imap::ImapProtocol;
pub use poll::{PollCycle, PollReport};
pub use send::{Mailer, build_message};
pub use session::{MailboxProtocol, MailboxSession, MessageId, RawMessage, SessionState};
pub use sink::{CommandSink, NotificationSink, StdoutSink};
