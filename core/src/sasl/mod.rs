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

//! SASL client side for SMTP AUTH: PLAIN and LOGIN.
//!
//! An [`Authenticator`] is driven by the SMTP client: `start` once per session to pick the
//! mechanism and optional initial response, then `next` for every server reply until the
//! server stops asking. Payloads are raw bytes; base64 framing is the client's job.
//!
//! Both mechanisms send the password in the clear (modulo base64), so both refuse to start
//! unless the connection is TLS or the server is on the loopback interface.

mod login;
mod mechanism;
mod plain;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use login::LoginAuth;
pub use mechanism::SaslMechanism;
pub use plain::PlainAuth;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SaslError {
    /// Credentials would travel over a plaintext, non-local connection. Nothing was sent.
    #[error("unencrypted connection")]
    UnencryptedConnection,
    #[error("wrong host name")]
    WrongHostName,
    #[error("unexpected server challenge")]
    UnexpectedChallenge,
    #[error("invalid server challenge: {0}")]
    InvalidChallenge(String),
}

/// What the client knows about the server when authentication starts.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Host name the client connected to (as configured, not as the server claims).
    pub name: String,
    /// Connection is TLS (implicit or after STARTTLS).
    pub tls: bool,
    /// Mechanisms advertised in the EHLO AUTH line.
    pub auth: Vec<String>,
}

/// Client half of a SASL exchange.
pub trait Authenticator: Send + Sync {
    /// Mechanism name and optional initial response.
    fn start(&self, server: &ServerInfo) -> Result<(&'static str, Option<Vec<u8>>), SaslError>;

    /// Response to one server message. `more` is true while the server is still asking
    /// (SMTP 334); false for the final success text.
    fn next(&self, from_server: &[u8], more: bool) -> Result<Vec<u8>, SaslError>;
}

/// Username, password and mechanism. Empty username and password mean no auth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCredential {
    #[serde(rename = "auth", default)]
    pub method: SaslMechanism,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl AuthCredential {
    pub fn is_present(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty()
    }

    /// Authenticator for this credential, or None when there is nothing to authenticate with.
    pub fn authenticator(&self, host: &str) -> Option<Box<dyn Authenticator>> {
        if !self.is_present() {
            return None;
        }
        Some(match self.method {
            SaslMechanism::Login => Box::new(LoginAuth::new(&self.username, &self.password)),
            SaslMechanism::Plain => Box::new(PlainAuth::new("", &self.username, &self.password, host)),
        })
    }
}

/// Loopback server names for which plaintext auth is tolerated.
pub fn is_localhost(name: &str) -> bool {
    name == "localhost" || name == "127.0.0.1" || name == "::1"
}

/// Fail-closed gate shared by the plaintext mechanisms.
fn require_secure(server: &ServerInfo) -> Result<(), SaslError> {
    // Without TLS nothing in ServerInfo can be trusted; an attacker may advertise any mechanism.
    if !server.tls && !is_localhost(&server.name) {
        return Err(SaslError::UnencryptedConnection);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_credentials_no_authenticator() {
        let c = AuthCredential::default();
        assert!(!c.is_present());
        assert!(c.authenticator("smtp.example.com").is_none());
    }

    #[test]
    fn method_selects_mechanism() {
        let server = ServerInfo {
            name: "smtp.example.com".into(),
            tls: true,
            auth: vec![],
        };
        let mut c = AuthCredential {
            method: SaslMechanism::Login,
            username: "u".into(),
            password: String::new(),
        };
        let (name, _) = c.authenticator("smtp.example.com").unwrap().start(&server).unwrap();
        assert_eq!(name, "LOGIN");
        c.method = SaslMechanism::Plain;
        let (name, initial) = c.authenticator("smtp.example.com").unwrap().start(&server).unwrap();
        assert_eq!(name, "PLAIN");
        assert_eq!(initial.unwrap(), b"\0u\0");
    }

    #[test]
    fn loopback_names() {
        assert!(is_localhost("localhost"));
        assert!(is_localhost("127.0.0.1"));
        assert!(is_localhost("::1"));
        assert!(!is_localhost("localhost.example.com"));
        assert!(!is_localhost("127.0.0.2"));
    }
}
