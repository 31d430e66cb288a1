/*
 * lib.rs
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

//! Postino core: the `Mailer` capability and its two transports.
//!
//! - `protocol::smtp::SmtpTransport` sends over an SMTP session (implicit TLS or
//!   plaintext with opportunistic STARTTLS, optional PLAIN/LOGIN auth).
//! - `protocol::sendmail::SendmailTransport` pipes an RFC 2822 header block and body
//!   into a local `sendmail`-compatible executable.
//!
//! Callers build a [`Message`], hold any [`Mailer`], and call `send`.

pub mod config;
pub mod error;
pub mod mailer;
pub mod message;
pub mod mime;
pub mod net;
pub mod protocol;
pub mod random;
pub mod sasl;

pub use config::{Configurer, JsonConfigurer, SendmailConfig, SmtpConfig};
pub use error::MailError;
pub use mailer::{MailTransport, Mailer};
pub use message::{Address, Message};
pub use protocol::sendmail::SendmailTransport;
pub use protocol::smtp::SmtpTransport;
pub use random::IdGenerator;
