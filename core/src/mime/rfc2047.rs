/*
 * rfc2047.rs
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

//! RFC 2047 encoded-word encoding (=?utf-8?q?...?= and =?utf-8?b?...?=) for header values.
//! Values that need no encoding are returned unchanged.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const CHARSET: &str = "utf-8";
/// An encoded-word may not exceed 75 characters (RFC 2047 section 2).
const MAX_ENCODED_WORD_LEN: usize = 75;
/// Room left for the payload once "=?utf-8?q?" and "?=" are accounted for.
const MAX_CONTENT_LEN: usize = MAX_ENCODED_WORD_LEN - "=?".len() - CHARSET.len() - "?q?".len() - "?=".len();
/// Raw bytes that fit into MAX_CONTENT_LEN base64 characters.
const MAX_BASE64_INPUT: usize = MAX_CONTENT_LEN / 4 * 3;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Q,
    B,
}

impl Encoding {
    fn letter(self) -> char {
        match self {
            Encoding::Q => 'q',
            Encoding::B => 'b',
        }
    }
}

/// True when the value has control characters (other than tab) or non-ASCII.
pub fn needs_encoding(s: &str) -> bool {
    s.bytes().any(|b| (b < b' ' || b > b'~') && b != b'\t')
}

/// Q-encode `s` as one or more UTF-8 encoded-words separated by spaces.
pub fn q_encode(s: &str) -> String {
    if !needs_encoding(s) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() * 3);
    open_word(&mut out, Encoding::Q);
    let mut current = 0;
    for ch in s.chars() {
        let mut utf8 = [0u8; 4];
        let bytes = ch.encode_utf8(&mut utf8).as_bytes();
        let len: usize = bytes.iter().map(|&b| q_len(b)).sum();
        if current + len > MAX_CONTENT_LEN {
            split_word(&mut out, Encoding::Q);
            current = 0;
        }
        for &b in bytes {
            push_q(&mut out, b);
        }
        current += len;
    }
    out.push_str("?=");
    out
}

/// B-encode `s` as one or more UTF-8 encoded-words separated by spaces.
pub fn b_encode(s: &str) -> String {
    if !needs_encoding(s) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() * 2);
    open_word(&mut out, Encoding::B);
    let mut start = 0;
    let mut current = 0;
    for (i, ch) in s.char_indices() {
        let len = ch.len_utf8();
        if current + len > MAX_BASE64_INPUT {
            out.push_str(&STANDARD.encode(&s.as_bytes()[start..i]));
            split_word(&mut out, Encoding::B);
            start = i;
            current = 0;
        }
        current += len;
    }
    out.push_str(&STANDARD.encode(&s.as_bytes()[start..]));
    out.push_str("?=");
    out
}

fn open_word(out: &mut String, enc: Encoding) {
    out.push_str("=?");
    out.push_str(CHARSET);
    out.push('?');
    out.push(enc.letter());
    out.push('?');
}

fn split_word(out: &mut String, enc: Encoding) {
    out.push_str("?= ");
    open_word(out, enc);
}

fn is_q_safe(b: u8) -> bool {
    (b'!'..=b'~').contains(&b) && b != b'=' && b != b'?' && b != b'_'
}

fn q_len(b: u8) -> usize {
    if b == b' ' || is_q_safe(b) {
        1
    } else {
        3
    }
}

fn push_q(out: &mut String, b: u8) {
    if b == b' ' {
        out.push('_');
    } else if is_q_safe(b) {
        out.push(b as char);
    } else {
        out.push('=');
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 15) as usize] as char);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        assert_eq!(q_encode("Hi there"), "Hi there");
        assert_eq!(b_encode("tab\tok"), "tab\tok");
    }

    #[test]
    fn q_encodes_utf8_and_specials() {
        assert_eq!(q_encode("Grüße an alle"), "=?utf-8?q?Gr=C3=BC=C3=9Fe_an_alle?=");
        assert_eq!(q_encode("é=?_"), "=?utf-8?q?=C3=A9=3D=3F=5F?=");
    }

    #[test]
    fn b_encodes_utf8() {
        assert_eq!(b_encode("¡Hola!"), "=?utf-8?b?wqFIb2xhIQ==?=");
    }

    #[test]
    fn long_values_split_into_short_words() {
        let subject = "ü".repeat(40);
        for encoded in [q_encode(&subject), b_encode(&subject)] {
            let words: Vec<&str> = encoded.split(' ').collect();
            assert!(words.len() > 1);
            for w in words {
                assert!(w.len() <= MAX_ENCODED_WORD_LEN, "{} too long", w);
                assert!(w.starts_with("=?utf-8?") && w.ends_with("?="));
            }
        }
    }

    #[test]
    fn split_never_cuts_a_character() {
        let encoded = b_encode(&"日本語".repeat(20));
        for w in encoded.split(' ') {
            let payload = &w["=?utf-8?b?".len()..w.len() - 2];
            let raw = STANDARD.decode(payload).unwrap();
            assert!(String::from_utf8(raw).is_ok());
        }
    }
}
