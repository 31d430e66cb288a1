/*
 * client.rs
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

//! Async SMTP client: connect, EHLO/HELO, STARTTLS, AUTH, MAIL FROM, RCPT TO, DATA, QUIT.
//! One session per message; nothing is kept open between sends.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_rustls::rustls::ClientConfig;
use tokio_rustls::TlsConnector;
use tracing::{debug, trace};

use super::dot_stuffer::dot_stuff;
use crate::error::MailError;
use crate::net::{default_connector, MailStream};
use crate::sasl::{Authenticator, SaslError, ServerInfo};

/// Sender and recipients for MAIL FROM / RCPT TO (bare addresses).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub from: String,
    pub recipients: Vec<String>,
}

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct SessionParams<'a> {
    pub host: &'a str,
    pub port: u16,
    pub implicit_tls: bool,
    pub local_name: &'a str,
    /// Client TLS settings for implicit TLS and STARTTLS. `None` trusts the platform roots.
    pub tls_config: Option<Arc<ClientConfig>>,
}

/// Parsed SMTP reply (code + text lines).
struct SmtpResponse {
    code: u16,
    lines: Vec<String>,
}

impl SmtpResponse {
    fn message(&self) -> String {
        self.lines.join("\n")
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    fn expect_code(self, command: &'static str, code: u16) -> Result<Self, MailError> {
        if self.code == code {
            Ok(self)
        } else {
            Err(MailError::protocol(command, self.code, self.message()))
        }
    }

    fn expect_success(self, command: &'static str) -> Result<Self, MailError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(MailError::protocol(command, self.code, self.message()))
        }
    }
}

/// Read one reply, following `NNN-` continuation lines.
async fn read_response<S>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<SmtpResponse>
where
    S: AsyncRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
        buf.clear();
        while !buf.ends_with(b"\n") {
            let b = stream.read_u8().await.map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed")
                } else {
                    e
                }
            })?;
            buf.push(b);
        }
        let raw: &[u8] = buf;
        let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let code = match raw.get(..3) {
            Some(digits) if digits.iter().all(u8::is_ascii_digit) => digits
                .iter()
                .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0')),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("bad reply line {:?}", String::from_utf8_lossy(raw)),
                ))
            }
        };
        let continuation = raw.get(3) == Some(&b'-');
        lines.push(String::from_utf8_lossy(raw.get(4..).unwrap_or(&[])).into_owned());
        if !continuation {
            return Ok(SmtpResponse { code, lines });
        }
    }
}

/// Write a line (no CRLF) then CRLF.
async fn write_line<S>(stream: &mut S, line: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(line).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await
}

/// An open SMTP session after greeting and EHLO.
pub struct SmtpSession {
    stream: MailStream,
    connector: TlsConnector,
    read_buf: Vec<u8>,
    host: String,
    local_name: String,
    /// EHLO keywords (upper case) to parameters. Empty after a HELO fallback.
    extensions: HashMap<String, String>,
}

impl SmtpSession {
    /// Connect, read the greeting and say hello. On a plain connection STARTTLS is used when
    /// the server offers it.
    pub async fn connect(params: &SessionParams<'_>) -> Result<Self, MailError> {
        let connector = match &params.tls_config {
            Some(config) => TlsConnector::from(Arc::clone(config)),
            None => default_connector(),
        };
        let stream = if params.implicit_tls {
            MailStream::connect_implicit_tls(params.host, params.port, &connector).await?
        } else {
            MailStream::connect_plain(params.host, params.port).await?
        };
        let mut session = SmtpSession {
            stream,
            connector,
            read_buf: Vec::with_capacity(512),
            host: params.host.to_string(),
            local_name: params.local_name.to_string(),
            extensions: HashMap::new(),
        };
        session.read().await?.expect_code("greeting", 220)?;
        session.hello().await?;
        if !session.stream.is_tls() && session.supports("STARTTLS") {
            session = session.starttls().await?;
        }
        Ok(session)
    }

    async fn read(&mut self) -> io::Result<SmtpResponse> {
        read_response(&mut self.stream, &mut self.read_buf).await
    }

    async fn command(&mut self, line: &str) -> Result<SmtpResponse, MailError> {
        trace!(verb = line.split(' ').next().unwrap_or(""), "smtp command");
        self.send_line(line).await
    }

    /// Write a line and read the reply without logging it (SASL responses).
    async fn send_line(&mut self, line: &str) -> Result<SmtpResponse, MailError> {
        write_line(&mut self.stream, line.as_bytes()).await?;
        Ok(self.read().await?)
    }

    /// EHLO, falling back to HELO for servers without extensions.
    async fn hello(&mut self) -> Result<(), MailError> {
        let r = self.command(&format!("EHLO {}", self.local_name)).await?;
        if !r.is_success() {
            debug!(code = r.code, "EHLO refused, trying HELO");
            self.extensions.clear();
            self.command(&format!("HELO {}", self.local_name))
                .await?
                .expect_success("HELO")?;
            return Ok(());
        }
        self.extensions = r
            .lines
            .iter()
            .skip(1)
            .map(|line| match line.split_once(' ') {
                Some((k, v)) => (k.to_uppercase(), v.trim().to_string()),
                None => (line.trim().to_uppercase(), String::new()),
            })
            .collect();
        Ok(())
    }

    /// Upgrade in place and greet again; extensions offered before TLS are discarded.
    async fn starttls(mut self) -> Result<Self, MailError> {
        self.command("STARTTLS").await?.expect_code("STARTTLS", 220)?;
        let SmtpSession {
            stream,
            connector,
            mut read_buf,
            host,
            local_name,
            ..
        } = self;
        let stream = stream.upgrade_to_tls(&host, &connector).await?;
        read_buf.clear();
        let mut session = SmtpSession {
            stream,
            connector,
            read_buf,
            host,
            local_name,
            extensions: HashMap::new(),
        };
        session.hello().await?;
        Ok(session)
    }

    pub fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.extensions.contains_key(&extension.to_uppercase())
    }

    /// What an authenticator is allowed to rely on.
    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: self.host.clone(),
            tls: self.stream.is_tls(),
            auth: self
                .extensions
                .get("AUTH")
                .map(|v| v.split_whitespace().map(|m| m.to_uppercase()).collect())
                .unwrap_or_default(),
        }
    }

    /// Run a SASL exchange. The authenticator's gate runs before anything is written.
    pub async fn authenticate(&mut self, auth: &dyn Authenticator) -> Result<(), MailError> {
        if !self.supports("AUTH") {
            return Err(MailError::AuthNotSupported);
        }
        let (mechanism, initial) = auth.start(&self.server_info())?;
        debug!(mechanism, "authenticating");
        let cmd = match initial {
            Some(ir) => format!("AUTH {} {}", mechanism, STANDARD.encode(ir)),
            None => format!("AUTH {}", mechanism),
        };
        let mut r = self.command(&cmd).await?;
        loop {
            let (message, more) = match r.code {
                334 => {
                    let text = r.lines.last().map(|s| s.trim()).unwrap_or("");
                    match STANDARD.decode(text) {
                        Ok(decoded) => (decoded, true),
                        Err(e) => {
                            self.cancel_auth().await;
                            return Err(SaslError::InvalidChallenge(e.to_string()).into());
                        }
                    }
                }
                // Final text is not base64: it is not a challenge.
                235 => (r.message().into_bytes(), false),
                _ => return Err(MailError::protocol("AUTH", r.code, r.message())),
            };
            let response = match auth.next(&message, more) {
                Ok(resp) => resp,
                Err(e) => {
                    self.cancel_auth().await;
                    return Err(e.into());
                }
            };
            if !more {
                return Ok(());
            }
            r = self.send_line(&STANDARD.encode(response)).await?;
        }
    }

    /// Abort a SASL exchange with `*`; the session is abandoned either way.
    async fn cancel_auth(&mut self) {
        let _ = self.command("*").await;
    }

    /// MAIL FROM, RCPT TO for every recipient, DATA with the dot-stuffed message.
    pub async fn send_mail(&mut self, envelope: &Envelope, message: &[u8]) -> Result<(), MailError> {
        self.command(&format!("MAIL FROM:<{}>", envelope.from))
            .await?
            .expect_success("MAIL FROM")?;
        for rcpt in &envelope.recipients {
            let r = self.command(&format!("RCPT TO:<{}>", rcpt)).await?;
            if !r.is_success() {
                return Err(MailError::protocol("RCPT TO", r.code, r.message()));
            }
        }
        self.command("DATA").await?.expect_code("DATA", 354)?;
        self.stream.write_all(&dot_stuff(message)).await?;
        self.stream.flush().await?;
        self.read().await?.expect_success("message")?;
        Ok(())
    }

    /// QUIT. The reply is read but a failure after a delivered message is not an error.
    pub async fn quit(mut self) -> Result<(), MailError> {
        if let Err(e) = self.command("QUIT").await {
            debug!(error = %e, "QUIT failed after delivery");
        }
        let _ = self.stream.shutdown().await;
        Ok(())
    }
}

/// Full session for one message: connect, optional auth, transaction, QUIT.
pub async fn send_message(
    params: &SessionParams<'_>,
    auth: Option<&dyn Authenticator>,
    envelope: &Envelope,
    message: &[u8],
) -> Result<(), MailError> {
    let mut session = SmtpSession::connect(params).await?;
    if let Some(auth) = auth {
        session.authenticate(auth).await?;
    }
    session.send_mail(envelope, message).await?;
    session.quit().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn multiline_reply_is_collected() {
        let mut input: &[u8] = b"250-mail.example.com\r\n250-AUTH PLAIN LOGIN\r\n250 SIZE 1000\r\n";
        let mut buf = Vec::new();
        let r = read_response(&mut input, &mut buf).await.unwrap();
        assert_eq!(r.code, 250);
        assert_eq!(r.lines, vec!["mail.example.com", "AUTH PLAIN LOGIN", "SIZE 1000"]);
        assert!(r.is_success());
    }

    #[tokio::test]
    async fn bare_code_line_is_accepted() {
        let mut input: &[u8] = b"354\r\n";
        let mut buf = Vec::new();
        let r = read_response(&mut input, &mut buf).await.unwrap();
        assert_eq!(r.code, 354);
        assert_eq!(r.message(), "");
    }

    #[tokio::test]
    async fn non_ascii_reply_code_is_an_error() {
        for input in [&b"25\xc3\xa9 hello\r\n"[..], b"\xff\xfe\xfd\r\n", b"2x0 ok\r\n", b"25\r\n"] {
            let mut input = input;
            let mut buf = Vec::new();
            let e = read_response(&mut input, &mut buf).await.err().unwrap();
            assert_eq!(e.kind(), io::ErrorKind::InvalidData);
        }
    }

    #[tokio::test]
    async fn non_utf8_text_is_kept_lossily() {
        let mut input: &[u8] = b"550 caf\xe9 closed\r\n";
        let mut buf = Vec::new();
        let r = read_response(&mut input, &mut buf).await.unwrap();
        assert_eq!(r.code, 550);
        assert_eq!(r.message(), "caf\u{fffd} closed");
    }

    #[tokio::test]
    async fn eof_mid_reply_is_an_error() {
        let mut input: &[u8] = b"250-first\r\n";
        let mut buf = Vec::new();
        let e = read_response(&mut input, &mut buf).await.err().unwrap();
        assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn rejection_keeps_server_text() {
        let r = SmtpResponse {
            code: 550,
            lines: vec!["5.1.1 no such user".into()],
        };
        match r.expect_success("RCPT TO") {
            Err(MailError::Protocol { command, code, message }) => {
                assert_eq!(command, "RCPT TO");
                assert_eq!(code, 550);
                assert_eq!(message, "5.1.1 no such user");
            }
            other => panic!("unexpected {:?}", other.map(|r| r.code)),
        }
    }
}
