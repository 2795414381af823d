//! Telnet banner grabbing

use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Default Telnet port
pub const TELNET_PORT: u16 = 23;

const BANNER_LEN: usize = 256;

/// First non-empty line of whatever the remote sends after connecting
pub async fn telnet_banner(ip: Ipv4Addr, port: u16, limit: Duration) -> Option<String> {
    let mut stream = timeout(limit, TcpStream::connect((ip, port))).await.ok()?.ok()?;

    let mut buf = [0u8; BANNER_LEN];
    let n = match timeout(limit, stream.read(&mut buf)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            trace!(ip = %ip, error = %e, "Telnet read failed");
            return None;
        }
        Err(_) => return None,
    };

    banner_line(&buf[..n])
}

/// Printable text of the first line, with Telnet option negotiation stripped
fn banner_line(data: &[u8]) -> Option<String> {
    let text: String = strip_negotiation(data)
        .into_iter()
        .map(|b| b as char)
        .filter(|c| !c.is_control() || *c == '\n')
        .collect();
    text.lines()
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
}

/// Drop IAC sequences (0xFF cmd [opt]) that precede most banners
fn strip_negotiation(data: &[u8]) -> Vec<u8> {
    const IAC: u8 = 0xFF;
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == IAC {
            // DO/DONT/WILL/WONT carry an option byte
            let skip = match data.get(i + 1) {
                Some(0xFB..=0xFE) => 3,
                Some(_) => 2,
                None => 1,
            };
            i += skip;
            continue;
        }
        if data[i].is_ascii() {
            out.push(data[i]);
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_banner_first_line() {
        assert_eq!(
            banner_line(b"  IPSC Strobe v2.1\r\nlogin: ").as_deref(),
            Some("IPSC Strobe v2.1")
        );
        assert!(banner_line(b"").is_none());
        assert!(banner_line(b"\r\n").is_none());
    }

    #[test]
    fn test_negotiation_stripped() {
        let data = [0xFF, 0xFD, 0x18, 0xFF, 0xFB, 0x01, b'o', b'k', b'\r', b'\n'];
        assert_eq!(banner_line(&data).as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_banner_from_server() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let _ = stream.write_all(b"Welcome to CTRL-1\r\n").await;
            }
        });
        let banner = telnet_banner(Ipv4Addr::LOCALHOST, port, Duration::from_millis(500)).await;
        assert_eq!(banner.as_deref(), Some("Welcome to CTRL-1"));
    }
}
