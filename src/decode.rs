//! Message decoding: header encoded-words and plain-text snippets.
//!
//! Every function here degrades instead of failing. A header that cannot
//! be decoded is passed through, a body that cannot be decoded becomes an
//! empty snippet.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::debug;

/// Appended to a snippet that was cut at the limit.
pub const ELLIPSIS: char = '\u{2026}';

/// Sender, subject and body preview of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSummary {
    pub from: String,
    pub subject: String,
    pub snippet: String,
}

impl DecodedSummary {
    /// Decode the `From` and `Subject` headers and the body snippet of a
    /// raw RFC 5322 message.
    #[must_use]
    pub fn from_raw(raw: &[u8], limit: usize) -> Self {
        Self {
            from: decode_header(header_value(raw, "from").as_deref()),
            subject: decode_header(header_value(raw, "subject").as_deref()),
            snippet: extract_snippet(raw, limit),
        }
    }

    /// The notification text: a fixed heading, sender, subject and, if
    /// there is one, the snippet after a blank line.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = format!("New email\nFrom: {}\nSubject: {}", self.from, self.subject);
        if !self.snippet.is_empty() {
            text.push_str("\n\n");
            text.push_str(&self.snippet);
        }
        text
    }
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Encoded segments are decoded with their declared charset and joined in
/// order; whitespace between two adjacent encoded-words is dropped.
/// Unencoded text passes through unchanged, and `None` yields an empty
/// string.
///
/// ```
/// use inbox_relay::decode_header;
///
/// assert_eq!(decode_header(Some("=?UTF-8?B?SG9sYQ==?= =?UTF-8?Q?_mundo?=")), "Hola mundo");
/// assert_eq!(decode_header(Some("plain")), "plain");
/// assert_eq!(decode_header(None), "");
/// ```
#[must_use]
pub fn decode_header(raw: Option<&str>) -> String {
    let Some(input) = raw else {
        return String::new();
    };

    let mut out = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let gap = &remaining[..start];
        if !last_was_encoded || !gap.trim().is_empty() {
            out.push_str(gap);
        }

        let tail = &remaining[start + 2..];
        if let Some((text, consumed)) = decode_word(tail) {
            out.push_str(&text);
            remaining = &tail[consumed..];
            last_was_encoded = true;
        } else {
            out.push_str("=?");
            remaining = tail;
            last_was_encoded = false;
        }
    }

    out.push_str(remaining);
    out
}

/// Decode one `charset?encoding?text?=` word (the leading `=?` already
/// stripped). Returns the text and the bytes consumed.
fn decode_word(s: &str) -> Option<(String, usize)> {
    let (charset, rest) = s.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let payload = &rest[..end];
    if charset.is_empty() || payload.contains(char::is_whitespace) {
        return None;
    }

    let consumed = charset.len() + encoding.len() + end + 4;
    let bytes = match encoding {
        "B" | "b" => STANDARD
            .decode(payload)
            .or_else(|_| STANDARD_NO_PAD.decode(payload.trim_end_matches('=')))
            .ok()?,
        "Q" | "q" => decode_q(payload),
        _ => return None,
    };

    // RFC 2231 language suffix: "utf-8*en"
    let charset = charset.split('*').next().unwrap_or(charset);
    Some((decode_charset(charset, &bytes), consumed))
}

/// Q encoding: `_` is a space, `=XX` is a hex byte.
fn decode_q(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match hex_byte(bytes[i + 1], bytes[i + 2]) {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                    }
                    None => {
                        out.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

const fn hex_byte(hi: u8, lo: u8) -> Option<u8> {
    const fn nibble(c: u8) -> Option<u8> {
        match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        }
    }
    match (nibble(hi), nibble(lo)) {
        (Some(h), Some(l)) => Some((h << 4) | l),
        _ => None,
    }
}

/// Decode bytes in a named charset, falling back to lossy UTF-8 when the
/// label is unknown.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    encoding_rs::Encoding::for_label(charset.trim().as_bytes()).map_or_else(
        || {
            debug!(charset, "Unknown charset, decoding as UTF-8");
            String::from_utf8_lossy(bytes).into_owned()
        },
        |encoding| encoding.decode(bytes).0.into_owned(),
    )
}

/// Raw (still encoded) value of the first header named `name`, with
/// folded continuation lines joined.
fn header_value(raw: &[u8], name: &str) -> Option<String> {
    let head_end = find_header_end(raw);
    let head = String::from_utf8_lossy(&raw[..head_end]);

    let mut found: Option<String> = None;
    for line in head.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(value) = found.as_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if found.is_some() {
            break;
        }
        if let Some((key, value)) = line.split_once(':')
            && key.trim().eq_ignore_ascii_case(name)
        {
            found = Some(value.trim().to_string());
        }
    }
    found
}

fn find_header_end(raw: &[u8]) -> usize {
    raw.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .or_else(|| raw.windows(2).position(|w| w == b"\n\n"))
        .unwrap_or(raw.len())
}

/// Extract a whitespace-collapsed plain-text preview of at most `limit`
/// characters, with [`ELLIPSIS`] appended when cut.
///
/// A multipart message contributes its first `text/plain` part that is
/// not an attachment; any other message contributes its body. Anything
/// else yields an empty string.
#[must_use]
pub fn extract_snippet(raw: &[u8], limit: usize) -> String {
    let Some(message) = MessageParser::default().parse(raw) else {
        return String::new();
    };
    let Some(root) = message.parts.first() else {
        return String::new();
    };

    let text = if matches!(root.body, PartType::Multipart(_)) {
        message
            .parts
            .iter()
            .find(|part| is_plain_text(part) && !is_attachment(part))
            .and_then(part_text)
    } else {
        part_text(root)
    };

    text.map_or_else(String::new, |t| truncate(&collapse_whitespace(&t), limit))
}

fn is_plain_text(part: &MessagePart<'_>) -> bool {
    part.content_type().is_none_or(|ct| {
        ct.ctype().eq_ignore_ascii_case("text")
            && ct.subtype().is_none_or(|sub| sub.eq_ignore_ascii_case("plain"))
    })
}

fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.content_disposition()
        .is_some_and(|d| d.ctype().to_ascii_lowercase().contains("attachment"))
}

/// Decoded text of a leaf part. Text bodies arrive already decoded from
/// their declared charset; binary bodies are decoded here.
fn part_text(part: &MessagePart<'_>) -> Option<String> {
    match &part.body {
        PartType::Text(text) | PartType::Html(text) => Some(text.to_string()),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            let charset = part
                .content_type()
                .and_then(|ct| ct.attribute("charset"))
                .unwrap_or("utf-8");
            Some(decode_charset(charset, bytes))
        }
        PartType::Message(_) | PartType::Multipart(_) => None,
    }
}

/// Collapse every whitespace run to a single space and trim the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to `limit` characters, appending [`ELLIPSIS`] if anything
/// was dropped.
#[must_use]
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => {
            let mut cut = text[..idx].to_string();
            cut.push(ELLIPSIS);
            cut
        }
        None => text.to_string(),
    }
}
