//! Fake IMAP server for integration testing
//!
//! An in-process IMAP server that speaks enough of the protocol to run
//! real poll cycles end-to-end:
//!
//! TCP -> [STARTTLS ->] TLS -> LOGIN -> SELECT -> UID SEARCH/FETCH/STORE -> LOGOUT
//!
//! ## Module layout
//!
//! - `server` -- TCP listener, TLS setup, connection dispatch, command log
//! - `handlers/` -- one file per IMAP command
//! - `mailbox` -- test data model (folders, emails, builder)
//! - `io` -- shared write helpers

mod handlers;
mod io;
pub mod mailbox;

pub use mailbox::MailboxBuilder;
pub use server::FakeImapServer;
