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

//! Host plugin: reads the `mailer` section of the host configuration once at startup and
//! exposes the selected transport as an `Arc<dyn Mailer>`.

use std::sync::Arc;

use postino_core::config::ConfigError;
use postino_core::{Configurer, Mailer, SendmailConfig, SendmailTransport, SmtpConfig, SmtpTransport};
use thiserror::Error;
use tracing::info;

pub const NAME: &str = "mailer";
pub const SMTP_KEY: &str = "mailer.smtp";
pub const SENDMAIL_KEY: &str = "mailer.sendmail";

#[derive(Debug, Error)]
pub enum PluginError {
    /// Neither transport is configured. Hosts treat this as "plugin off", not a failure.
    #[error("mailer plugin disabled: no mailer.smtp or mailer.sendmail section")]
    Disabled,
    #[error("mailer plugin configuration: {0}")]
    Config(#[from] ConfigError),
}

impl PluginError {
    pub fn is_disabled(&self) -> bool {
        matches!(self, PluginError::Disabled)
    }
}

#[derive(Default)]
pub struct MailerPlugin {
    mailer: Option<Arc<dyn Mailer>>,
}

impl MailerPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the transport. SMTP wins when both sections are present.
    pub fn init<C: Configurer>(&mut self, cfg: &C) -> Result<(), PluginError> {
        if cfg.has(SMTP_KEY) {
            let config: SmtpConfig = cfg.unmarshal_key(SMTP_KEY)?;
            config.validate()?;
            info!(
                host = %config.host,
                port = config.effective_port(),
                tls = config.tls,
                "mailer using smtp"
            );
            self.mailer = Some(Arc::new(SmtpTransport::new(config)));
        } else if cfg.has(SENDMAIL_KEY) {
            let config: SendmailConfig = cfg.unmarshal_key(SENDMAIL_KEY)?;
            let transport = SendmailTransport::from_config(&config)?;
            info!(path = %transport.path().display(), "mailer using sendmail");
            self.mailer = Some(Arc::new(transport));
        } else {
            return Err(PluginError::Disabled);
        }
        Ok(())
    }

    /// The configured capability; None before a successful `init`.
    pub fn mailer(&self) -> Option<Arc<dyn Mailer>> {
        self.mailer.clone()
    }

    pub fn name(&self) -> &'static str {
        NAME
    }
}
