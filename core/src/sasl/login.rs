/*
 * login.rs
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

//! LOGIN SASL mechanism.
//!
//! LOGIN is obsolete (it has no RFC of its own) but some providers, Outlook among them,
//! accept nothing else. The server prompts `Username:` then `Password:`; each prompt is
//! answered with the matching credential.
//!
//! Credentials are only sent over TLS or to a loopback server. Otherwise `start` fails
//! and nothing is transmitted.

use super::{require_secure, Authenticator, SaslError, ServerInfo};

/// LOGIN authenticator. Holds only the two credential strings, so it can be reused for
/// any number of sessions one after another.
pub struct LoginAuth {
    username: String,
    password: String,
}

impl LoginAuth {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

impl Authenticator for LoginAuth {
    fn start(&self, server: &ServerInfo) -> Result<(&'static str, Option<Vec<u8>>), SaslError> {
        require_secure(server)?;
        Ok(("LOGIN", None))
    }

    fn next(&self, from_server: &[u8], more: bool) -> Result<Vec<u8>, SaslError> {
        if !more {
            return Ok(Vec::new());
        }
        let prompt = String::from_utf8_lossy(from_server).to_lowercase();
        Ok(match prompt.as_str() {
            "username:" => self.username.as_bytes().to_vec(),
            "password:" => self.password.as_bytes().to_vec(),
            _ => Vec::new(),
        })
    }
}
