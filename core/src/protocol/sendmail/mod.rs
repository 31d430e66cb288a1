/*
 * mod.rs
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

//! Local delivery through a `sendmail`-compatible executable.
//!
//! Only `To`, `Subject`, the sender and one HTML (or text) body are passed on.
//! Cc, Bcc and attachments are not transmitted by this transport.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use tracing::debug;

use crate::config::{ConfigError, SendmailConfig};
use crate::error::MailError;
use crate::mailer::Mailer;
use crate::message::Message;
use crate::mime::{append_header, format_address, rfc2047, sanitize_header_value};

const CONTENT_TYPE: &str = "text/html; charset=UTF-8";

/// Pipes one message per call into the executable at a fixed, already resolved path.
#[derive(Debug, Clone)]
pub struct SendmailTransport {
    path: PathBuf,
}

impl SendmailTransport {
    /// Use `path` as is. Callers normally go through [`SendmailTransport::from_config`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the configured executable now; a missing one is a configuration error.
    pub fn from_config(config: &SendmailConfig) -> Result<Self, ConfigError> {
        config.resolve().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recipients as passed both in the `To` header and as the sole argument.
    pub fn recipient_list(message: &Message) -> String {
        message
            .to
            .iter()
            .map(|a| format_address(a, false))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Process input: sorted header block, blank line, body.
    pub fn build_input(message: &Message) -> Vec<u8> {
        let to = Self::recipient_list(message);
        let subject = rfc2047::q_encode(&message.subject);
        let from = format_address(&message.from, true);
        let mut out = Vec::new();
        for (name, value) in [
            ("Content-Type", CONTENT_TYPE),
            ("From", from.as_str()),
            ("Subject", subject.as_str()),
            ("To", to.as_str()),
        ] {
            append_header(&mut out, name, &sanitize_header_value(value));
        }
        out.extend_from_slice(b"\r\n");
        let body = if message.html.is_empty() {
            &message.text
        } else {
            &message.html
        };
        out.extend_from_slice(body.as_bytes());
        out
    }
}

impl Mailer for SendmailTransport {
    fn send(&self, message: &Message) -> Result<(), MailError> {
        let to = Self::recipient_list(message);
        let input = Self::build_input(message);
        debug!(path = %self.path.display(), recipients = message.to.len(), "invoking sendmail");

        let mut child = Command::new(&self.path)
            .arg(&to)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdin = child.stdin.take();
        // stdin is fed from a helper thread so stderr keeps draining while the child writes.
        let (written, output) = thread::scope(|s| {
            let writer = s.spawn(move || -> io::Result<()> {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(&input)?;
                }
                Ok(())
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "stdin writer panicked")));
            (written, output)
        });
        let output = output?;
        if !output.status.success() {
            return Err(MailError::Process {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;
        debug!(status = %output.status, "sendmail finished");
        Ok(())
    }
}
