/*
 * message.rs
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

//! Message and address types. Transports build their wire format from these.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mime::format_address;

/// Mail address: optional display name plus `user@domain`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Proper name; may be empty.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
}

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            address: address.into(),
        }
    }

    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Copy of `self` with empty fields taken from `fallback`. Non-empty fields always win.
    pub fn or_default_from(&self, fallback: &Address) -> Address {
        Address {
            name: if self.name.is_empty() {
                fallback.name.clone()
            } else {
                self.name.clone()
            },
            address: if self.address.is_empty() {
                fallback.address.clone()
            } else {
                self.address.clone()
            },
        }
    }

    /// Domain part when the address has exactly one `@`.
    pub fn domain(&self) -> Option<&str> {
        let mut parts = self.address.split('@');
        let (_local, domain) = (parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        Some(domain)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_address(self, true))
    }
}

/// A message to send. Transports never write back into it.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub from: Address,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub subject: String,
    pub html: String,
    pub text: String,
    /// Filename to raw content.
    pub attachments: BTreeMap<String, Vec<u8>>,
    /// Extra headers, written with the caller's casing.
    pub headers: BTreeMap<String, String>,
}

impl Message {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_requires_exactly_one_at() {
        assert_eq!(Address::new("a@b.com").domain(), Some("b.com"));
        assert_eq!(Address::new("ab.com").domain(), None);
        assert_eq!(Address::new("a@b@c.com").domain(), None);
    }

    #[test]
    fn explicit_fields_win_over_default() {
        let fallback = Address::with_name("Robot", "noreply@example.com");
        let own = Address::new("me@example.org");
        let merged = own.or_default_from(&fallback);
        assert_eq!(merged.address, "me@example.org");
        assert_eq!(merged.name, "Robot");
        assert_eq!(Address::default().or_default_from(&fallback), fallback);
    }

    #[test]
    fn header_lookup_ignores_case() {
        let mut m = Message::default();
        m.headers.insert("message-id".into(), "<x@y>".into());
        assert_eq!(m.header("Message-ID"), Some("<x@y>"));
        assert_eq!(m.header("X-Other"), None);
    }
}
