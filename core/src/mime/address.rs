/*
 * address.rs
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

//! RFC 5322 mailbox formatting for headers and delivery lists.

use crate::message::Address;
use crate::mime::rfc2047;

/// Characters that may not appear inside an encoded-word used as a display name.
const ENCODED_WORD_SPECIALS: &str = "\"#$%&'(),.:;<>@[]^`{|}~";

/// `"Name" <address>` when `include_name` and the name is non-empty, else the bare address.
/// No syntax validation; malformed addresses are left for the server to reject.
pub fn format_address(addr: &Address, include_name: bool) -> String {
    if !include_name || addr.name.is_empty() {
        return addr.address.clone();
    }
    format!("{} <{}>", display_name(&addr.name), addr.address)
}

/// Format each address, keeping input order.
pub fn format_addresses(addrs: &[Address], include_name: bool) -> Vec<String> {
    addrs.iter().map(|a| format_address(a, include_name)).collect()
}

/// Header form of a display name: quoted when printable ASCII, otherwise an encoded-word.
fn display_name(name: &str) -> String {
    let printable = name
        .chars()
        .all(|c| c == ' ' || c == '\t' || ('!'..='~').contains(&c));
    if printable {
        return quote(name);
    }
    if name.chars().any(|c| ENCODED_WORD_SPECIALS.contains(c)) {
        rfc2047::b_encode(name)
    } else {
        rfc2047::q_encode(name)
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
