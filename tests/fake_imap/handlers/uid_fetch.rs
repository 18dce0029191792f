//! UID FETCH command handler.
//!
//! Message bodies travel as **counted literals**:
//!
//! ```text
//! * <seq> FETCH (UID <uid> BODY[] {<length>}
//! <exactly length bytes of raw RFC 5322 message>
//! )
//! ```
//!
//! The `{length}\r\n` marker tells the client the next `length` bytes
//! are raw data, not protocol text. The sequence number is the 1-based
//! index of the message within the folder (RFC 3501 Section 7.4.2).
//!
//! Expunged messages produce no FETCH line at all; the command still
//! completes with OK, as real servers do for UIDs that no longer exist.

use super::extract_uids;
use crate::fake_imap::io::{write_bytes, write_line};
use crate::fake_imap::mailbox::Mailbox;
use imap_codec::imap_types::sequence::SequenceSet;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Handle the UID FETCH command. Returns each email body as an IMAP
/// literal. Fetching never changes flags (the client uses `BODY.PEEK`).
pub async fn handle_uid_fetch<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    sequence_set: &SequenceSet,
    mailbox: &Mailbox,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder) = selected_folder.and_then(|name| mailbox.get_folder(name)) else {
        let resp = format!("{tag} BAD No folder selected\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    let max_uid = folder.emails.iter().map(|e| e.uid).max().unwrap_or(0);
    let live = folder.emails.iter().filter(|e| !e.expunged);

    for (idx, email) in live.enumerate() {
        if !extract_uids(sequence_set, max_uid).contains(&email.uid) {
            continue;
        }
        let seq = idx + 1;
        let header = format!(
            "* {seq} FETCH (UID {} BODY[] {{{}}}\r\n",
            email.uid,
            email.raw.len()
        );
        if write_line(stream, &header).await.is_err()
            || write_bytes(stream, &email.raw).await.is_err()
            || write_line(stream, ")\r\n").await.is_err()
        {
            return;
        }
    }

    let resp = format!("{tag} OK FETCH completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::test_support::{drain, uid_set};
    use crate::fake_imap::mailbox::MailboxBuilder;

    async fn run(uid: u32, mailbox: &Mailbox) -> String {
        let (client, server) = tokio::io::duplex(4096);
        let mut stream = BufReader::new(server);

        handle_uid_fetch("A1", &uid_set(uid), mailbox, Some("INBOX"), &mut stream).await;
        drop(stream);
        drain(client).await
    }

    #[tokio::test]
    async fn fetches_email_as_literal() {
        let raw = b"From: a@b.com\r\nSubject: Test\r\n\r\nBody";
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(42, false, raw)
            .build();

        let output = run(42, &mailbox).await;

        assert!(output.contains(&format!("* 1 FETCH (UID 42 BODY[] {{{}}}\r\n", raw.len())));
        assert!(output.contains("Subject: Test"));
        assert!(output.ends_with("A1 OK FETCH completed\r\n"));
    }

    #[tokio::test]
    async fn expunged_email_returns_nothing() {
        let mailbox = MailboxBuilder::new().folder("INBOX").expunged(7).build();

        let output = run(7, &mailbox).await;

        assert!(!output.contains("FETCH ("));
        assert!(output.contains("A1 OK FETCH completed"));
    }
}
