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

//! SMTP transport. One session per send: connect, optional STARTTLS and AUTH, deliver, QUIT.

mod build_mime;
mod client;
mod dot_stuffer;

pub use build_mime::{build_envelope, build_message, default_message_id, BuiltMessage};
pub use client::{send_message, Envelope, SessionParams, SmtpSession};
pub use dot_stuffer::dot_stuff;

use std::io;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio_rustls::rustls::ClientConfig;
use tracing::debug;

use crate::config::SmtpConfig;
use crate::error::MailError;
use crate::mailer::Mailer;
use crate::message::{Address, Message};
use crate::random::IdGenerator;

const DEFAULT_EHLO_HOSTNAME: &str = "localhost";

/// SMTP transport built from a fixed [`SmtpConfig`].
///
/// `send` blocks: it runs the session on the runtime handle given to
/// [`SmtpTransport::with_runtime_handle`], or on a throwaway current-thread runtime.
/// Async callers should prefer [`SmtpTransport::send_async`].
pub struct SmtpTransport {
    config: SmtpConfig,
    ehlo_hostname: String,
    ids: Arc<IdGenerator>,
    runtime_handle: Option<Handle>,
    tls_config: Option<Arc<ClientConfig>>,
}

impl SmtpTransport {
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config,
            ehlo_hostname: DEFAULT_EHLO_HOSTNAME.to_string(),
            ids: IdGenerator::shared(),
            runtime_handle: None,
            tls_config: None,
        }
    }

    /// Run blocking sends on an existing runtime.
    pub fn with_runtime_handle(config: SmtpConfig, handle: Handle) -> Self {
        let mut t = Self::new(config);
        t.runtime_handle = Some(handle);
        t
    }

    /// Generator for Message-IDs and MIME boundaries. Default is [`IdGenerator::shared`].
    pub fn set_id_generator(&mut self, ids: Arc<IdGenerator>) -> &mut Self {
        self.ids = ids;
        self
    }

    /// Set EHLO hostname (default "localhost").
    pub fn set_ehlo_hostname(&mut self, name: impl Into<String>) -> &mut Self {
        self.ehlo_hostname = name.into();
        self
    }

    /// TLS client settings, e.g. a private root store. Default trusts the platform roots,
    /// falling back to the bundled webpki roots.
    pub fn set_tls_config(&mut self, config: Arc<ClientConfig>) -> &mut Self {
        self.tls_config = Some(config);
        self
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// Sender actually used for `message`: its own fields, with empty ones taken from the
    /// configured default. The message itself is left alone.
    pub fn effective_from(&self, message: &Message) -> Address {
        message.from.or_default_from(&self.config.from)
    }

    /// Envelope and wire bytes for `message`, without sending.
    pub fn prepare(&self, message: &Message) -> Result<BuiltMessage, MailError> {
        let from = self.effective_from(message);
        build_message(message, &from, &self.ids, Utc::now())
    }

    /// Deliver `message` over a new SMTP session.
    pub async fn send_async(&self, message: &Message) -> Result<(), MailError> {
        let built = self.prepare(message)?;
        let authenticator = self.config.auth.authenticator(&self.config.host);
        let params = SessionParams {
            host: &self.config.host,
            port: self.config.effective_port(),
            implicit_tls: self.config.tls,
            local_name: &self.ehlo_hostname,
            tls_config: self.tls_config.clone(),
        };
        debug!(
            host = params.host,
            port = params.port,
            tls = params.implicit_tls,
            recipients = built.envelope.recipients.len(),
            "sending via smtp"
        );
        send_message(&params, authenticator.as_deref(), &built.envelope, &built.bytes).await
    }

    fn send_on_new_runtime(&self, message: &Message) -> Result<(), MailError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(self.send_async(message))
    }
}

impl Mailer for SmtpTransport {
    /// Blocking send. Safe to call from inside a runtime: a multi-thread worker is moved out
    /// of the scheduler with `block_in_place`, a current-thread runtime hands the session to
    /// a scoped thread with its own runtime.
    fn send(&self, message: &Message) -> Result<(), MailError> {
        match (Handle::try_current().ok(), &self.runtime_handle) {
            (Some(current), configured) if current.runtime_flavor() == RuntimeFlavor::MultiThread => {
                let handle = configured.clone().unwrap_or(current);
                tokio::task::block_in_place(|| handle.block_on(self.send_async(message)))
            }
            (Some(_), _) => thread::scope(|s| {
                s.spawn(|| self.send_on_new_runtime(message))
                    .join()
                    .map_err(|_| io::Error::new(io::ErrorKind::Other, "smtp send thread panicked"))?
            }),
            (None, Some(handle)) => handle.block_on(self.send_async(message)),
            (None, None) => self.send_on_new_runtime(message),
        }
    }
}
