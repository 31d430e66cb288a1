/*
 * plain.rs
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

//! PLAIN SASL (RFC 4616).

use super::{require_secure, Authenticator, SaslError, ServerInfo};

/// Build PLAIN initial response: authzid NUL authcid NUL password (UTF-8).
pub fn encode_plain(authzid: &str, authcid: &str, password: &str) -> Vec<u8> {
    format!("{}\0{}\0{}", authzid, authcid, password).into_bytes()
}

/// PLAIN authenticator bound to the host it was configured for.
pub struct PlainAuth {
    identity: String,
    username: String,
    password: String,
    host: String,
}

impl PlainAuth {
    pub fn new(identity: &str, username: &str, password: &str, host: &str) -> Self {
        Self {
            identity: identity.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            host: host.to_string(),
        }
    }
}

impl Authenticator for PlainAuth {
    fn start(&self, server: &ServerInfo) -> Result<(&'static str, Option<Vec<u8>>), SaslError> {
        require_secure(server)?;
        if server.name != self.host {
            return Err(SaslError::WrongHostName);
        }
        Ok((
            "PLAIN",
            Some(encode_plain(&self.identity, &self.username, &self.password)),
        ))
    }

    fn next(&self, _from_server: &[u8], more: bool) -> Result<Vec<u8>, SaslError> {
        if more {
            // Everything was in the initial response.
            return Err(SaslError::UnexpectedChallenge);
        }
        Ok(Vec::new())
    }
}
