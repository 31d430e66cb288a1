/*
 * config.rs
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

//! Transport configuration: the decoded SMTP and sendmail settings, the host's key/value
//! configuration surface, and sendmail executable lookup.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::message::Address;
use crate::sasl::AuthCredential;

/// Conventional sendmail locations, tried in order when no path is configured.
pub const SENDMAIL_CANDIDATES: &[&str] = &["/usr/sbin/sendmail", "/usr/bin/sendmail", "sendmail"];

const SMTPS_PORT: u16 = 465;
const SMTP_PORT: u16 = 25;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot decode {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no sendmail executable found (tried {})", tried.join(", "))]
    ExecutableNotFound { tried: Vec<String> },
    #[error("{path}: {source}")]
    Executable {
        path: String,
        #[source]
        source: which::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// SMTP settings, decoded from the `mailer.smtp` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: String,
    /// 0 means the default for the connection mode (see [`SmtpConfig::effective_port`]).
    #[serde(default)]
    pub port: u16,
    /// Implicit TLS from the first byte. When false, STARTTLS is used if offered.
    #[serde(default)]
    pub tls: bool,
    #[serde(flatten)]
    pub auth: AuthCredential,
    /// Sender used for the parts of `Message::from` that are empty.
    #[serde(default)]
    pub from: Address,
}

impl SmtpConfig {
    pub fn effective_port(&self) -> u16 {
        match self.port {
            0 if self.tls => SMTPS_PORT,
            0 => SMTP_PORT,
            p => p,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("smtp host is empty".into()));
        }
        Ok(())
    }
}

/// Sendmail settings, decoded from the `mailer.sendmail` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendmailConfig {
    /// Executable path or bare command name. Absent or empty means search the usual places.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd_path: Option<String>,
}

impl SendmailConfig {
    /// Absolute path of the configured executable.
    pub fn resolve(&self) -> Result<PathBuf, ConfigError> {
        match self.cmd_path.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => which::which(path).map_err(|source| ConfigError::Executable {
                path: path.to_string(),
                source,
            }),
            _ => resolve_first(SENDMAIL_CANDIDATES),
        }
    }
}

/// First of `candidates` that resolves to an executable.
pub fn resolve_first(candidates: &[&str]) -> Result<PathBuf, ConfigError> {
    for candidate in candidates {
        match which::which(candidate) {
            Ok(path) => {
                debug!(candidate = %candidate, path = %path.display(), "resolved mail executable");
                return Ok(path);
            }
            Err(e) => debug!(candidate = %candidate, error = %e, "mail executable not usable"),
        }
    }
    Err(ConfigError::ExecutableNotFound {
        tried: candidates.iter().map(|c| c.to_string()).collect(),
    })
}

/// Host configuration surface: presence test and typed decode by key.
pub trait Configurer {
    fn has(&self, key: &str) -> bool;
    fn unmarshal_key<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError>;
}

/// [`Configurer`] over a JSON tree. Keys are dotted paths (`mailer.smtp`).
#[derive(Debug, Clone, Default)]
pub struct JsonConfigurer {
    root: Value,
}

impl JsonConfigurer {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s)
            .map(Self::new)
            .map_err(|source| ConfigError::Decode {
                key: String::new(),
                source,
            })
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        let mut node = &self.root;
        for part in key.split('.') {
            node = node.as_object()?.get(part)?;
        }
        match node {
            Value::Null => None,
            v => Some(v),
        }
    }
}

impl Configurer for JsonConfigurer {
    fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    fn unmarshal_key<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let value = self
            .lookup(key)
            .ok_or_else(|| ConfigError::Invalid(format!("missing key {}", key)))?;
        T::deserialize(value).map_err(|source| ConfigError::Decode {
            key: key.to_string(),
            source,
        })
    }
}
