//! Layered settings
//!
//! Settings are read from key-value layers (the process environment and
//! an optional env file) merged with a first-value-wins rule, then
//! validated into an immutable [`Settings`] value. Nothing here writes to
//! the process environment.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Environment variable naming the env file.
pub const ENV_FILE_VAR: &str = "INBOX_RELAY_ENV";

/// Older name for [`ENV_FILE_VAR`], still honoured.
pub const LEGACY_ENV_FILE_VAR: &str = "ALFRED_EMAIL_ENV";

/// Older key names accepted when the current key is unset.
const LEGACY_KEYS: &[(&str, &str)] = &[
    ("MAIL_ADDRESS", "GMAIL_ADDRESS"),
    ("MAIL_APP_PASSWORD", "GMAIL_APP_PASSWORD"),
    ("NOTIFY_TARGET", "TELEGRAM_TARGET"),
];

/// Env file used when neither `--env-file` nor [`ENV_FILE_VAR`] is given.
pub const DEFAULT_ENV_FILE: &str = "inbox-relay.env";

const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BATCH_SIZE: usize = 5;
const DEFAULT_SNIPPET_LIMIT: usize = 400;

/// How the IMAP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS from the first byte (IMAPS, usually port 993).
    Implicit,
    /// Plain TCP upgraded with `STARTTLS` (local bridges, port 143/1143).
    StartTls,
}

impl FromStr for TlsMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "implicit" | "tls" | "ssl" => Ok(Self::Implicit),
            "starttls" => Ok(Self::StartTls),
            other => Err(Error::Config(format!("Invalid IMAP_TLS: {other}"))),
        }
    }
}

/// IMAP endpoint and credentials
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub tls: TlsMode,
    pub accept_invalid_certs: bool,
    pub username: String,
    pub password: String,
    pub folder: String,
    pub timeout: Duration,
}

/// SMTP submission endpoint and credentials
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub accept_invalid_certs: bool,
    pub username: String,
    pub password: String,
    pub from: String,
    pub timeout: Duration,
}

/// External notifier invocation
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub command: String,
    pub channel: String,
    pub target: Option<String>,
    pub timeout: Duration,
}

/// Poll-cycle tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Maximum messages handled per cycle.
    pub batch_size: usize,
    /// Snippet length in characters.
    pub snippet_limit: usize,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            snippet_limit: DEFAULT_SNIPPET_LIMIT,
        }
    }
}

/// Everything the binaries need, loaded once per invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub imap: ImapConfig,
    pub smtp: SmtpConfig,
    pub notify: NotifyConfig,
    pub poll: PollOptions,
}

impl Settings {
    /// Load settings from the process environment layered over an env
    /// file.
    ///
    /// `env_file` wins over `INBOX_RELAY_ENV` (or `ALFRED_EMAIL_ENV`),
    /// which wins over `inbox-relay.env` in the working directory. Only
    /// the implicit default may be absent. Variables that are not valid
    /// UTF-8 are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an explicitly named env file cannot be
    /// read or a required key is missing or invalid.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        let process = utf8_pairs(std::env::vars_os());

        let (path, explicit) = match env_file {
            Some(p) => (p.to_path_buf(), true),
            None => std::env::var_os(ENV_FILE_VAR)
                .or_else(|| std::env::var_os(LEGACY_ENV_FILE_VAR))
                .map_or_else(|| (PathBuf::from(DEFAULT_ENV_FILE), false), |p| (PathBuf::from(p), true)),
        };

        let file = if explicit || path.exists() {
            load_env_file(&path)?
        } else {
            debug!("No env file at {}, using environment only", path.display());
            Vec::new()
        };

        Self::from_map(&merge_first_wins([process, file]))
    }

    /// Build settings from an already-merged key-value map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `MAIL_ADDRESS` or `MAIL_APP_PASSWORD`
    /// is missing, or any numeric/boolean value does not parse.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        let address = required(vars, "MAIL_ADDRESS")?;
        let secret = required(vars, "MAIL_APP_PASSWORD")?;
        let accept_invalid_certs = parse_or(vars, "MAIL_ACCEPT_INVALID_CERTS", false)?;
        let timeout = Duration::from_secs(parse_or(vars, "MAIL_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?);

        let imap = ImapConfig {
            host: string_or(vars, "IMAP_HOST", "imap.gmail.com"),
            port: parse_or(vars, "IMAP_PORT", 993)?,
            tls: parse_or(vars, "IMAP_TLS", TlsMode::Implicit)?,
            accept_invalid_certs,
            username: address.clone(),
            password: secret.clone(),
            folder: string_or(vars, "IMAP_FOLDER", "INBOX"),
            timeout,
        };

        let smtp = SmtpConfig {
            host: string_or(vars, "SMTP_HOST", "smtp.gmail.com"),
            port: parse_or(vars, "SMTP_PORT", 587)?,
            accept_invalid_certs,
            username: address.clone(),
            password: secret,
            from: address,
            timeout,
        };

        let notify = NotifyConfig {
            command: string_or(vars, "NOTIFY_COMMAND", "clawdbot"),
            channel: string_or(vars, "NOTIFY_CHANNEL", "telegram"),
            target: lookup(vars, "NOTIFY_TARGET").cloned(),
            timeout: Duration::from_secs(parse_or(
                vars,
                "NOTIFY_TIMEOUT_SECS",
                DEFAULT_NOTIFY_TIMEOUT_SECS,
            )?),
        };

        let poll = PollOptions {
            batch_size: parse_or(vars, "POLL_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            snippet_limit: parse_or(vars, "SNIPPET_LIMIT", DEFAULT_SNIPPET_LIMIT)?,
        };
        if poll.batch_size == 0 {
            return Err(Error::Config("POLL_BATCH_SIZE must be at least 1".into()));
        }

        Ok(Self {
            imap,
            smtp,
            notify,
            poll,
        })
    }
}

/// Read `KEY=VALUE` pairs from an env file without touching the process
/// environment.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file cannot be opened or a line does
/// not parse.
pub fn load_env_file(path: &Path) -> Result<Vec<(String, String)>> {
    let iter = dotenvy::from_path_iter(path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {e}", path.display())))?;

    iter.map(|item| item.map_err(|e| Error::Config(format!("Invalid line in {}: {e}", path.display()))))
        .collect()
}

/// Keep the pairs that are valid UTF-8, dropping the rest.
fn utf8_pairs<I>(vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (Ok(key), Err(_)) => {
                debug!("Skipping {} from environment: value is not UTF-8", key);
                None
            }
            (Err(key), _) => {
                debug!("Skipping non-UTF-8 environment variable {:?}", key);
                None
            }
        })
        .collect()
}

/// Merge layers given in priority order. The first layer to define a key
/// keeps it; later layers only fill gaps.
pub fn merge_first_wins<L>(layers: L) -> HashMap<String, String>
where
    L: IntoIterator,
    L::Item: IntoIterator<Item = (String, String)>,
{
    let mut merged = HashMap::new();
    for layer in layers {
        for (key, value) in layer {
            merged.entry(key).or_insert(value);
        }
    }
    merged
}

/// Non-empty value for `key`, falling back to its legacy name.
fn lookup<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a String> {
    let get = |k: &str| vars.get(k).filter(|v| !v.is_empty());
    get(key).or_else(|| {
        LEGACY_KEYS
            .iter()
            .find(|(current, _)| *current == key)
            .and_then(|(_, legacy)| get(legacy))
    })
}

fn required(vars: &HashMap<String, String>, key: &str) -> Result<String> {
    lookup(vars, key)
        .cloned()
        .ok_or_else(|| Error::Config(format!("{key} not set")))
}

fn string_or(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    lookup(vars, key).map_or_else(|| default.to_string(), Clone::clone)
}

fn parse_or<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(vars, key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {key}: {e}"))),
        None => Ok(default),
    }
}
