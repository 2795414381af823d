//! HTTP banner probing (Server header and HTML title)

use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use crate::tcp::is_refusal;

/// Default HTTP port
pub const HTTP_PORT: u16 = 80;

/// Cap on bytes read from a GET response
const MAX_BODY: usize = 8192;
const CHUNK: usize = 2048;

static SERVER_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^Server:[ \t]*(.+)$").expect("valid regex"));
static HTML_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title>(.*?)</title>").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// What an HTTP probe learned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpInfo {
    /// Connected or refused
    pub reachable: bool,
    pub title: Option<String>,
    pub server: Option<String>,
}

impl HttpInfo {
    /// Title first, then server string
    pub fn identity(&self) -> Option<&str> {
        self.title.as_deref().or(self.server.as_deref())
    }

    fn has_identity(&self) -> bool {
        self.title.is_some() || self.server.is_some()
    }

    fn absorb(&mut self, response: &[u8]) {
        let text = String::from_utf8_lossy(response);
        if let Some(server) = SERVER_HEADER
            .captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
        {
            self.server = Some(server);
        }
        if let Some(title) = HTML_TITLE
            .captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| WHITESPACE.replace_all(m.as_str(), " ").trim().to_string())
            .filter(|s| !s.is_empty())
        {
            self.title = Some(title);
        }
    }
}

enum Exchange {
    Response(Vec<u8>),
    Refused,
    Failed,
}

/// Issue a HEAD, then a GET if HEAD gave no server or title
pub async fn http_probe(ip: Ipv4Addr, port: u16, limit: Duration) -> HttpInfo {
    let mut info = HttpInfo::default();

    match request(ip, port, "HEAD", limit, CHUNK).await {
        Exchange::Response(data) => {
            info.reachable = true;
            info.absorb(&data);
        }
        Exchange::Refused => info.reachable = true,
        Exchange::Failed => {}
    }

    if !info.has_identity() {
        if let Exchange::Response(data) = request(ip, port, "GET", limit, MAX_BODY).await {
            info.reachable = true;
            info.absorb(&data);
        }
    }

    info
}

async fn request(ip: Ipv4Addr, port: u16, method: &str, limit: Duration, cap: usize) -> Exchange {
    let mut stream = match timeout(limit, TcpStream::connect((ip, port))).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) if is_refusal(&e) => return Exchange::Refused,
        Ok(Err(e)) => {
            trace!(ip = %ip, port, error = %e, "HTTP connect failed");
            return Exchange::Failed;
        }
        Err(_) => return Exchange::Failed,
    };

    let req = format!(
        "{} / HTTP/1.0\r\nHost: {}\r\nConnection: close\r\n\r\n",
        method, ip
    );
    match timeout(limit, stream.write_all(req.as_bytes())).await {
        Ok(Ok(())) => {}
        _ => return Exchange::Failed,
    }

    Exchange::Response(read_capped(&mut stream, limit, cap).await)
}

/// Read until EOF, error, timeout, or `cap` bytes
async fn read_capped(stream: &mut TcpStream, limit: Duration, cap: usize) -> Vec<u8> {
    let mut data = Vec::new();
    let mut buf = [0u8; CHUNK];
    while data.len() < cap {
        let n = match timeout(limit, stream.read(&mut buf)).await {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                if e.kind() != io::ErrorKind::ConnectionReset {
                    trace!(error = %e, "HTTP read failed");
                }
                break;
            }
        };
        data.extend_from_slice(&buf[..n]);
    }
    data
}
