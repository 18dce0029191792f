//! Test data model for the fake IMAP server
//!
//! Provides a builder-style API for constructing mailbox state:
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .folder("INBOX")
//!         .email(1, false, raw_rfc5322_bytes)
//!         .email(2, true, raw_rfc5322_bytes)
//!         .expunged(3)
//!     .reject_login()
//!     .stall_search()
//!     .build();
//! ```
//!
//! The `Mailbox` is shared with the fake IMAP server via `Arc` so the
//! server knows which folders exist, what emails they contain, and
//! whether each email has been read (the `\Seen` flag). The server
//! mutates it on `UID STORE`, and tests inspect it afterwards.

/// A complete mailbox: named folders plus server behaviour switches.
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub folders: Vec<Folder>,
    /// Answer every LOGIN with `NO`.
    pub reject_login: bool,
    /// Never answer `UID SEARCH`, like a server that hangs mid-session.
    pub stall_search: bool,
}

impl Mailbox {
    /// Look up a folder by name (case-sensitive, matching real IMAP).
    pub fn get_folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.name == name)
    }

    pub fn get_folder_mut(&mut self, name: &str) -> Option<&mut Folder> {
        self.folders.iter_mut().find(|f| f.name == name)
    }

    /// UIDs in `folder` that currently carry `\Seen`.
    pub fn seen_uids(&self, folder: &str) -> Vec<u32> {
        self.get_folder(folder)
            .map(|f| f.emails.iter().filter(|e| e.seen).map(|e| e.uid).collect())
            .unwrap_or_default()
    }
}

/// A single IMAP folder (e.g. "INBOX", "Archive").
#[derive(Debug, Clone)]
pub struct Folder {
    pub name: String,
    pub emails: Vec<TestEmail>,
}

/// A test email stored in a folder.
///
/// - `uid`: IMAP UID, unique per folder and stable across sessions.
/// - `seen`: whether `\Seen` is set. `UID SEARCH UNSEEN` returns
///   emails without it.
/// - `raw`: the complete RFC 5322 message returned by `BODY[]`.
/// - `expunged`: still reported by SEARCH but gone by FETCH time, the
///   way a message deleted by another client mid-session behaves.
#[derive(Debug, Clone)]
pub struct TestEmail {
    pub uid: u32,
    pub seen: bool,
    pub raw: Vec<u8>,
    pub expunged: bool,
}

/// Builder for constructing a `Mailbox` step by step.
///
/// Call `.folder(name)` to start a new folder, then chain
/// `.email(uid, seen, raw)` calls to add messages to it.
/// Finish with `.build()` to get the final `Mailbox`.
pub struct MailboxBuilder {
    folders: Vec<Folder>,
    reject_login: bool,
    stall_search: bool,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self {
            folders: Vec::new(),
            reject_login: false,
            stall_search: false,
        }
    }

    /// Add a new folder. Subsequent `.email()` calls add to this folder.
    pub fn folder(mut self, name: &str) -> Self {
        self.folders.push(Folder {
            name: name.to_string(),
            emails: Vec::new(),
        });
        self
    }

    /// Add an email to the most recently added folder.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.folder()` call.
    pub fn email(self, uid: u32, seen: bool, raw: &[u8]) -> Self {
        self.push(TestEmail {
            uid,
            seen,
            raw: raw.to_vec(),
            expunged: false,
        })
    }

    /// Add an unseen message that disappears between SEARCH and FETCH.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.folder()` call.
    pub fn expunged(self, uid: u32) -> Self {
        self.push(TestEmail {
            uid,
            seen: false,
            raw: Vec::new(),
            expunged: true,
        })
    }

    /// Make the server refuse every LOGIN.
    pub const fn reject_login(mut self) -> Self {
        self.reject_login = true;
        self
    }

    /// Make the server swallow `UID SEARCH` without replying.
    pub const fn stall_search(mut self) -> Self {
        self.stall_search = true;
        self
    }

    /// Consume the builder and return the finished `Mailbox`.
    pub fn build(self) -> Mailbox {
        Mailbox {
            folders: self.folders,
            reject_login: self.reject_login,
            stall_search: self.stall_search,
        }
    }

    fn push(mut self, email: TestEmail) -> Self {
        self.folders
            .last_mut()
            .expect("call .folder() before .email()")
            .emails
            .push(email);
        self
    }
}
