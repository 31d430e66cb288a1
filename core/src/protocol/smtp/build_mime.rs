/*
 * build_mime.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Postino, a pluggable mail delivery library.
 *
 * Postino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Postino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Postino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Build the RFC 5322 / MIME message and SMTP envelope from a `Message`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;

use super::client::Envelope;
use crate::error::MailError;
use crate::message::{Address, Message};
use crate::mime::{append_header, format_address, format_addresses, rfc2047, sanitize_header_value};
use crate::random::IdGenerator;

/// Length of the random part of a synthesized Message-ID.
const MESSAGE_ID_LEN: usize = 15;
const BOUNDARY_LEN: usize = 28;
/// Fields the builder writes itself. Caller headers with these names are dropped.
const MANAGED_HEADERS: &[&str] = &[
    "From",
    "To",
    "Cc",
    "Bcc",
    "Subject",
    "Date",
    "MIME-Version",
    "Content-Type",
    "Content-Transfer-Encoding",
    "Content-Disposition",
];

/// RFC 5322 limit on line length, excluding CRLF.
const MAX_LINE_LEN: usize = 998;

/// RFC 2231 attr-char: everything else in a filename is percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Wire-ready message plus its envelope.
#[derive(Debug, Clone)]
pub struct BuiltMessage {
    pub envelope: Envelope,
    pub bytes: Vec<u8>,
    /// Message-ID this builder added, if any.
    pub message_id: Option<String>,
}

/// Build the message. `from` is the effective sender (defaults already applied).
pub fn build_message(
    message: &Message,
    from: &Address,
    ids: &IdGenerator,
    date: DateTime<Utc>,
) -> Result<BuiltMessage, MailError> {
    let envelope = build_envelope(message, from)?;
    let mut out = Vec::new();

    append_header(&mut out, "From", &format_address(from, true));
    if !message.to.is_empty() {
        append_header(&mut out, "To", &format_addresses(&message.to, true).join(", "));
    }
    if !message.cc.is_empty() {
        append_header(&mut out, "Cc", &format_addresses(&message.cc, true).join(", "));
    }
    append_header(
        &mut out,
        "Subject",
        &rfc2047::q_encode(&sanitize_header_value(&message.subject)),
    );
    append_header(&mut out, "Date", &date.to_rfc2822());
    append_header(&mut out, "MIME-Version", "1.0");

    for (name, value) in &message.headers {
        if !is_valid_header_name(name) {
            return Err(MailError::InvalidHeader(name.clone()));
        }
        if is_managed_header(name) {
            debug!(header = %name, "ignoring caller header written by the builder");
            continue;
        }
        append_header(&mut out, name, &rfc2047::q_encode(&sanitize_header_value(value)));
    }
    let message_id = default_message_id(message, from, ids);
    if let Some(ref id) = message_id {
        append_header(&mut out, "Message-ID", id);
    }

    append_content(&mut out, message, ids);

    Ok(BuiltMessage {
        envelope,
        bytes: out,
        message_id,
    })
}

/// Sender plus the union of to, cc and bcc as bare addresses, first occurrence kept.
pub fn build_envelope(message: &Message, from: &Address) -> Result<Envelope, MailError> {
    let sender = format_address(from, false);
    check_envelope_address(&sender)?;
    let mut recipients: Vec<String> = Vec::new();
    for rcpt in message.to.iter().chain(&message.cc).chain(&message.bcc) {
        let rcpt = format_address(rcpt, false);
        check_envelope_address(&rcpt)?;
        if !recipients.contains(&rcpt) {
            recipients.push(rcpt);
        }
    }
    if recipients.is_empty() {
        return Err(MailError::NoRecipients);
    }
    Ok(Envelope {
        from: sender,
        recipients,
    })
}

fn check_envelope_address(addr: &str) -> Result<(), MailError> {
    if addr.contains(['\r', '\n']) {
        return Err(MailError::InvalidAddress(addr.to_string()));
    }
    Ok(())
}

/// `<random@domain>` unless the caller already set a Message-ID, or the sender has no
/// single `@` to take a domain from.
pub fn default_message_id(message: &Message, from: &Address, ids: &IdGenerator) -> Option<String> {
    if message.header("Message-ID").is_some() {
        return None;
    }
    let domain = from.domain()?;
    Some(format!("<{}@{}>", ids.generate(MESSAGE_ID_LEN), domain))
}

fn is_managed_header(name: &str) -> bool {
    MANAGED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// RFC 5322 field name: printable ASCII except colon.
fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| (b'!'..=b'~').contains(&b) && b != b':')
}

fn new_boundary(ids: &IdGenerator) -> String {
    format!("=_{}", ids.generate(BOUNDARY_LEN))
}

fn append_content(out: &mut Vec<u8>, message: &Message, ids: &IdGenerator) {
    let has_text = !message.text.is_empty();
    let has_html = !message.html.is_empty();

    if message.attachments.is_empty() {
        append_body(out, message, has_text, has_html, ids);
        return;
    }

    let boundary = new_boundary(ids);
    append_header(
        out,
        "Content-Type",
        &format!("multipart/mixed; boundary=\"{}\"", boundary),
    );
    out.extend_from_slice(b"\r\n");
    if has_text || has_html {
        append_delimiter(out, &boundary);
        append_body(out, message, has_text, has_html, ids);
    }
    for (filename, content) in &message.attachments {
        append_delimiter(out, &boundary);
        append_attachment(out, filename, content);
    }
    append_close_delimiter(out, &boundary);
}

fn append_body(out: &mut Vec<u8>, message: &Message, has_text: bool, has_html: bool, ids: &IdGenerator) {
    if has_text && has_html {
        let boundary = new_boundary(ids);
        append_header(
            out,
            "Content-Type",
            &format!("multipart/alternative; boundary=\"{}\"", boundary),
        );
        out.extend_from_slice(b"\r\n");
        // Least preferred first.
        append_delimiter(out, &boundary);
        append_text_part(out, "plain", &message.text);
        append_delimiter(out, &boundary);
        append_text_part(out, "html", &message.html);
        append_close_delimiter(out, &boundary);
    } else if has_html {
        append_text_part(out, "html", &message.html);
    } else {
        append_text_part(out, "plain", &message.text);
    }
}

fn append_delimiter(out: &mut Vec<u8>, boundary: &str) {
    out.extend_from_slice(b"\r\n--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn append_close_delimiter(out: &mut Vec<u8>, boundary: &str) {
    out.extend_from_slice(b"\r\n--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"--\r\n");
}

fn append_text_part(out: &mut Vec<u8>, subtype: &str, body: &str) {
    let body = normalize_crlf(body);
    append_header(out, "Content-Type", &format!("text/{}; charset=UTF-8", subtype));
    if is_7bit(&body) {
        append_header(out, "Content-Transfer-Encoding", "7bit");
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(body.as_bytes());
    } else {
        append_header(out, "Content-Transfer-Encoding", "base64");
        out.extend_from_slice(b"\r\n");
        append_base64(out, body.as_bytes());
    }
}

fn append_attachment(out: &mut Vec<u8>, filename: &str, content: &[u8]) {
    let mime_type = mime_guess::from_path(filename)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    append_header(out, "Content-Type", &mime_type);
    append_header(
        out,
        "Content-Disposition",
        &format!("attachment; {}", filename_param(filename)),
    );
    append_header(out, "Content-Transfer-Encoding", "base64");
    out.extend_from_slice(b"\r\n");
    append_base64(out, content);
}

/// `filename="..."` for printable ASCII names, RFC 2231 `filename*=UTF-8''...` otherwise.
fn filename_param(filename: &str) -> String {
    if filename.bytes().all(|b| (b' '..=b'~').contains(&b)) {
        format!(
            "filename=\"{}\"",
            filename.replace('\\', "\\\\").replace('"', "\\\"")
        )
    } else {
        format!("filename*=UTF-8''{}", utf8_percent_encode(filename, ATTR_CHAR))
    }
}

fn append_base64(out: &mut Vec<u8>, data: &[u8]) {
    let encoded = STANDARD.encode(data);
    for line in encoded.as_bytes().chunks(76) {
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }
}

/// Every line break becomes CRLF.
fn normalize_crlf(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\n', "\r\n")
}

fn is_7bit(body: &str) -> bool {
    body.is_ascii() && body.split("\r\n").all(|line| line.len() <= MAX_LINE_LEN)
}
