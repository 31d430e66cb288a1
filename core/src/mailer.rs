/*
 * mailer.rs
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

//! Mailer trait: the one send capability callers depend on.

use crate::error::MailError;
use crate::message::Message;
use crate::protocol::sendmail::SendmailTransport;
use crate::protocol::smtp::SmtpTransport;

/// Sends messages. Blocks until the transport has handed the message off or failed.
/// Each call is independent; implementations hold no per-send state.
pub trait Mailer: Send + Sync {
    fn send(&self, message: &Message) -> Result<(), MailError>;
}

/// The closed set of transports, for hosts that want a concrete value rather than `dyn Mailer`.
pub enum MailTransport {
    Smtp(SmtpTransport),
    Sendmail(SendmailTransport),
}

impl MailTransport {
    pub fn kind(&self) -> &'static str {
        match self {
            MailTransport::Smtp(_) => "smtp",
            MailTransport::Sendmail(_) => "sendmail",
        }
    }
}

impl Mailer for MailTransport {
    fn send(&self, message: &Message) -> Result<(), MailError> {
        match self {
            MailTransport::Smtp(t) => t.send(message),
            MailTransport::Sendmail(t) => t.send(message),
        }
    }
}

impl From<SmtpTransport> for MailTransport {
    fn from(t: SmtpTransport) -> Self {
        MailTransport::Smtp(t)
    }
}

impl From<SendmailTransport> for MailTransport {
    fn from(t: SendmailTransport) -> Self {
        MailTransport::Sendmail(t)
    }
}
