/*
 * error.rs
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

//! Errors returned by `Mailer::send`.

use std::process::ExitStatus;

use thiserror::Error;

use crate::sasl::SaslError;

/// Failure of a single send. Nothing is retried; the error goes straight back to the caller.
#[derive(Debug, Error)]
pub enum MailError {
    /// Envelope address would break the command line (CR or LF).
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    /// Caller header name is not a valid field name.
    #[error("invalid header name: {0:?}")]
    InvalidHeader(String),

    #[error("no recipients")]
    NoRecipients,

    /// Authentication refused locally or rejected by the mechanism.
    #[error("authentication failed: {0}")]
    Auth(#[from] SaslError),

    #[error("credentials configured but server does not support AUTH")]
    AuthNotSupported,

    /// Connect, TLS handshake, socket or pipe failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server replied with a non-success code.
    #[error("{command} failed: {code} {message}")]
    Protocol {
        command: &'static str,
        code: u16,
        message: String,
    },

    /// Mail executable ran but did not exit successfully.
    #[error("sendmail exited with {status}: {stderr}")]
    Process { status: ExitStatus, stderr: String },
}

impl MailError {
    pub(crate) fn protocol(command: &'static str, code: u16, message: impl Into<String>) -> Self {
        Self::Protocol {
            command,
            code,
            message: message.into(),
        }
    }

    /// True when the failure came from the server's reply rather than from this side.
    pub fn is_server_rejection(&self) -> bool {
        matches!(self, MailError::Protocol { .. })
    }
}
