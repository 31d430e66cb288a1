/*
 * common/mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Scripted loopback SMTP server shared by the integration tests. It speaks just
 * enough ESMTP for one session and records every line the client sends. TLS,
 * implicit or after STARTTLS, uses a self-signed certificate for 127.0.0.1.
 */

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig, ServerConnection, StreamOwned};

/// Server and client halves of a throwaway certificate for 127.0.0.1 and localhost.
pub struct TestCert {
    pub server: Arc<ServerConfig>,
    /// Trusts only this certificate.
    pub client: Arc<ClientConfig>,
}

pub fn self_signed() -> TestCert {
    let cert = rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string(), "localhost".to_string()])
        .unwrap();
    let der = CertificateDer::from(cert.serialize_der().unwrap());
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));

    let server = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![der.clone()], key)
        .unwrap();
    let mut roots = RootCertStore::empty();
    roots.add(der).unwrap();
    let client = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TestCert {
        server: Arc::new(server),
        client: Arc::new(client),
    }
}

/// TLS offered by the fake server.
#[derive(Clone, Default)]
pub enum ServerTls {
    #[default]
    None,
    /// Handshake before the greeting.
    Implicit(Arc<ServerConfig>),
    /// Advertise STARTTLS and upgrade when asked.
    StartTls(Arc<ServerConfig>),
}

trait Conn: Read + Write + Send {}
impl<T: Read + Write + Send> Conn for T {}

type Reader = BufReader<Box<dyn Conn>>;

fn wrap_tls(config: &Arc<ServerConfig>, tcp: TcpStream) -> Reader {
    let conn = ServerConnection::new(Arc::clone(config)).unwrap();
    BufReader::new(Box::new(StreamOwned::new(conn, tcp)) as Box<dyn Conn>)
}

/// How the fake server behaves for one session.
#[derive(Clone)]
pub struct Script {
    /// EHLO keywords after the greeting line, e.g. "AUTH PLAIN LOGIN".
    pub extensions: Vec<&'static str>,
    /// Refuse EHLO so the client has to fall back to HELO.
    pub refuse_ehlo: bool,
    pub username: &'static str,
    pub password: &'static str,
    /// Recipients answered with 550.
    pub reject: Vec<&'static str>,
    pub tls: ServerTls,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            extensions: vec!["8BITMIME", "AUTH PLAIN LOGIN"],
            refuse_ehlo: false,
            username: "user",
            password: "pass",
            reject: Vec::new(),
            tls: ServerTls::None,
        }
    }
}

/// What the client sent during the session.
#[derive(Debug, Default)]
pub struct Transcript {
    /// Command lines (including AUTH continuation lines), without CRLF.
    pub commands: Vec<String>,
    /// DATA payload as received (still dot-stuffed), lines joined with CRLF.
    pub data: String,
    /// The session was encrypted when it ended.
    pub secured: bool,
}

impl Transcript {
    pub fn has_command(&self, prefix: &str) -> bool {
        self.commands.iter().any(|c| c.starts_with(prefix))
    }
}

pub struct FakeServer {
    pub port: u16,
    handle: JoinHandle<Transcript>,
}

impl FakeServer {
    pub fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve(stream, &script)
        });
        FakeServer { port, handle }
    }

    /// Wait for the client to hang up and return what it sent.
    pub fn finish(self) -> Transcript {
        self.handle.join().unwrap()
    }
}

fn serve(stream: TcpStream, script: &Script) -> Transcript {
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    let raw = stream.try_clone().unwrap();
    let mut t = Transcript::default();
    let mut reader: Reader = match &script.tls {
        ServerTls::Implicit(config) => {
            t.secured = true;
            wrap_tls(config, stream)
        }
        _ => BufReader::new(Box::new(stream) as Box<dyn Conn>),
    };
    reply(&mut reader, "220 fake.example.com ESMTP ready");
    loop {
        let Some(line) = read_line(&mut reader) else {
            break;
        };
        t.commands.push(line.clone());
        let upper = line.to_uppercase();
        if upper.starts_with("EHLO") {
            if script.refuse_ehlo {
                reply(&mut reader, "502 command not implemented");
                continue;
            }
            let mut extensions = script.extensions.clone();
            if matches!(script.tls, ServerTls::StartTls(_)) && !t.secured {
                extensions.push("STARTTLS");
            }
            if extensions.is_empty() {
                reply(&mut reader, "250 fake.example.com");
            } else {
                reply(&mut reader, "250-fake.example.com");
                let (last, rest) = extensions.split_last().unwrap();
                for ext in rest {
                    reply(&mut reader, &format!("250-{}", ext));
                }
                reply(&mut reader, &format!("250 {}", last));
            }
        } else if upper == "STARTTLS" {
            match &script.tls {
                ServerTls::StartTls(config) if !t.secured => {
                    reply(&mut reader, "220 2.0.0 Ready to start TLS");
                    // The client waits for the 220, so nothing is left in the plaintext buffer.
                    reader = wrap_tls(config, raw.try_clone().unwrap());
                    t.secured = true;
                }
                _ => reply(&mut reader, "454 4.7.0 TLS not available"),
            }
        } else if upper.starts_with("HELO") {
            reply(&mut reader, "250 fake.example.com");
        } else if upper == "AUTH LOGIN" {
            reply(&mut reader, "334 VXNlcm5hbWU6");
            let Some(user) = read_line(&mut reader) else { break };
            t.commands.push(user.clone());
            reply(&mut reader, "334 UGFzc3dvcmQ6");
            let Some(pass) = read_line(&mut reader) else { break };
            t.commands.push(pass.clone());
            if decode(&user) == script.username && decode(&pass) == script.password {
                reply(&mut reader, "235 2.7.0 Authentication successful");
            } else {
                reply(&mut reader, "535 5.7.8 Authentication credentials invalid");
            }
        } else if let Some(ir) = upper.strip_prefix("AUTH PLAIN ").map(|_| &line[11..]) {
            let expected = format!("\0{}\0{}", script.username, script.password);
            if decode(ir) == expected {
                reply(&mut reader, "235 2.7.0 Authentication successful");
            } else {
                reply(&mut reader, "535 5.7.8 Authentication credentials invalid");
            }
        } else if upper.starts_with("AUTH") {
            reply(&mut reader, "504 5.5.4 Unrecognized authentication type");
        } else if upper.starts_with("MAIL FROM:") {
            reply(&mut reader, "250 2.1.0 OK");
        } else if upper.starts_with("RCPT TO:") {
            let rcpt = line["RCPT TO:".len()..].trim_matches(['<', '>']);
            if script.reject.iter().any(|r| *r == rcpt) {
                reply(&mut reader, "550 5.1.1 No such user");
            } else {
                reply(&mut reader, "250 2.1.5 OK");
            }
        } else if upper == "DATA" {
            reply(&mut reader, "354 End data with <CR><LF>.<CR><LF>");
            let mut lines = Vec::new();
            while let Some(l) = read_line(&mut reader) {
                if l == "." {
                    break;
                }
                lines.push(l);
            }
            t.data = lines.join("\r\n");
            reply(&mut reader, "250 2.0.0 Queued");
        } else if upper == "QUIT" {
            reply(&mut reader, "221 2.0.0 Bye");
            break;
        } else if line == "*" {
            reply(&mut reader, "501 5.0.0 Authentication cancelled");
        } else {
            reply(&mut reader, "500 5.5.2 Unknown command");
        }
    }
    t
}

fn reply(reader: &mut Reader, s: &str) {
    let out = reader.get_mut();
    let _ = out.write_all(format!("{}\r\n", s).as_bytes());
    let _ = out.flush();
}

fn read_line(reader: &mut Reader) -> Option<String> {
    let mut buf = String::new();
    match reader.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim_end_matches(['\r', '\n']).to_string()),
    }
}

fn decode(b64: &str) -> String {
    STANDARD
        .decode(b64.trim())
        .map(|raw| String::from_utf8_lossy(&raw).into_owned())
        .unwrap_or_default()
}
