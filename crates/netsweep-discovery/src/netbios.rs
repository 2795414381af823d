//! NetBIOS node status (NBSTAT) name query over UDP 137

use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::trace;

/// NetBIOS name service port
pub const NETBIOS_PORT: u16 = 137;

const HEADER_LEN: usize = 12;
const NAME_ENTRY_LEN: usize = 18;
const GROUP_FLAG: u16 = 0x8000;
const WORKSTATION_SUFFIX: u8 = 0x00;

/// One entry of the node status name table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    pub name: String,
    pub suffix: u8,
    pub group: bool,
}

/// Wildcard node status request (RFC 1002 4.2.17)
pub fn build_query(transaction_id: u16) -> Vec<u8> {
    let mut query = Vec::with_capacity(50);
    query.extend_from_slice(&transaction_id.to_be_bytes());
    query.extend_from_slice(&[0x00, 0x00]); // flags
    query.extend_from_slice(&[0x00, 0x01]); // questions
    query.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    // "*" padded with NULs, first-level encoded
    query.push(32);
    let mut name = [0u8; 16];
    name[0] = b'*';
    for b in name {
        query.push((b >> 4) + b'A');
        query.push((b & 0x0F) + b'A');
    }
    query.push(0x00);

    query.extend_from_slice(&[0x00, 0x21]); // NBSTAT
    query.extend_from_slice(&[0x00, 0x01]); // IN
    query
}

fn skip_name(data: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let len = *data.get(pos)?;
        if len == 0 {
            return Some(pos + 1);
        }
        if len & 0xC0 == 0xC0 {
            return Some(pos + 2);
        }
        pos += 1 + len as usize;
    }
}

/// Parse the name table out of a node status response
pub fn parse_response(data: &[u8]) -> Vec<NameEntry> {
    parse_names(data).unwrap_or_default()
}

fn parse_names(data: &[u8]) -> Option<Vec<NameEntry>> {
    if data.len() < HEADER_LEN {
        return None;
    }
    let questions = u16::from_be_bytes([data[4], data[5]]);
    let answers = u16::from_be_bytes([data[6], data[7]]);
    if answers == 0 {
        return None;
    }

    let mut pos = HEADER_LEN;
    for _ in 0..questions {
        pos = skip_name(data, pos)? + 4;
    }
    // answer name, type, class, ttl, rdlength
    pos = skip_name(data, pos)? + 10;

    let count = *data.get(pos)? as usize;
    pos += 1;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let Some(raw) = data.get(pos..pos + NAME_ENTRY_LEN) else {
            break;
        };
        pos += NAME_ENTRY_LEN;
        let flags = u16::from_be_bytes([raw[16], raw[17]]);
        entries.push(NameEntry {
            name: String::from_utf8_lossy(&raw[..15]).trim().to_string(),
            suffix: raw[15],
            group: flags & GROUP_FLAG != 0,
        });
    }
    Some(entries)
}

/// Unique workstation name first, then any purely alphabetic name
pub fn pick_name(entries: &[NameEntry]) -> Option<String> {
    entries
        .iter()
        .find(|e| {
            e.suffix == WORKSTATION_SUFFIX
                && !e.group
                && !e.name.is_empty()
                && e.name != "__MSBROWSE__"
        })
        .or_else(|| {
            entries
                .iter()
                .find(|e| !e.name.is_empty() && e.name.chars().all(|c| c.is_ascii_alphabetic()))
        })
        .map(|e| e.name.clone())
}

/// Query a host's NetBIOS name table and pick its name
pub async fn netbios_name(ip: Ipv4Addr, limit: Duration) -> Option<String> {
    netbios_name_on(ip, NETBIOS_PORT, limit).await
}

pub(crate) async fn netbios_name_on(ip: Ipv4Addr, port: u16, limit: Duration) -> Option<String> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok()?;
    let transaction_id = (u32::from(ip) as u16) ^ 0x4e53;
    socket
        .send_to(&build_query(transaction_id), (ip, port))
        .await
        .ok()?;

    let mut buf = [0u8; 1024];
    let exchange = async {
        loop {
            let (n, from) = socket.recv_from(&mut buf).await?;
            if from.ip() == ip && n >= 2 && buf[..2] == transaction_id.to_be_bytes() {
                return Ok::<_, std::io::Error>(n);
            }
        }
    };

    let n = match timeout(limit, exchange).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            trace!(ip = %ip, error = %e, "NetBIOS query failed");
            return None;
        }
        Err(_) => return None,
    };

    pick_name(&parse_response(&buf[..n]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, suffix: u8, flags: u16) -> Vec<u8> {
        let mut raw = format!("{:<15}", name).into_bytes();
        raw.push(suffix);
        raw.extend_from_slice(&flags.to_be_bytes());
        raw
    }

    fn response(transaction_id: u16, entries: &[Vec<u8>]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&transaction_id.to_be_bytes());
        data.extend_from_slice(&[0x84, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]);
        // answer name copied from the query
        data.extend_from_slice(&build_query(0)[HEADER_LEN..HEADER_LEN + 34]);
        data.extend_from_slice(&[0x00, 0x21, 0x00, 0x01, 0, 0, 0, 0]);
        let rdlen = (1 + entries.len() * NAME_ENTRY_LEN + 46) as u16;
        data.extend_from_slice(&rdlen.to_be_bytes());
        data.push(entries.len() as u8);
        for e in entries {
            data.extend_from_slice(e);
        }
        data.extend_from_slice(&[0u8; 46]); // statistics
        data
    }

    #[test]
    fn test_query_layout() {
        let query = build_query(0x0102);
        assert_eq!(query.len(), 50);
        assert_eq!(&query[..2], &[0x01, 0x02]);
        assert_eq!(&query[13..15], b"CK");
        assert_eq!(&query[46..], &[0x00, 0x21, 0x00, 0x01]);
    }

    #[test]
    fn test_parse_and_pick_unique_workstation() {
        let data = response(
            7,
            &[
                entry("WORKGROUP", 0x00, 0x8400),
                entry("CTRL-1", 0x20, 0x0400),
                entry("CTRL-1", 0x00, 0x0400),
            ],
        );
        let entries = parse_response(&data);
        assert_eq!(entries.len(), 3);
        assert!(entries[0].group);
        assert_eq!(pick_name(&entries).as_deref(), Some("CTRL-1"));
    }

    #[test]
    fn test_pick_alphabetic_fallback() {
        let entries = vec![
            NameEntry { name: "__MSBROWSE__".into(), suffix: 0x01, group: true },
            NameEntry { name: "OFFICE".into(), suffix: 0x1E, group: true },
        ];
        assert_eq!(pick_name(&entries).as_deref(), Some("OFFICE"));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_response(&[0x00, 0x01, 0x02]).is_empty());
        let mut data = response(1, &[entry("HOST", 0x00, 0x0400)]);
        data.truncate(60);
        assert!(parse_response(&data).is_empty());
    }

    #[tokio::test]
    async fn test_query_against_fake_responder() {
        let responder = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = responder.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 128];
            if let Ok((_, from)) = responder.recv_from(&mut buf).await {
                let id = u16::from_be_bytes([buf[0], buf[1]]);
                let reply = response(id, &[entry("STROBE", 0x00, 0x0400)]);
                let _ = responder.send_to(&reply, from).await;
            }
        });
        let name = netbios_name_on(Ipv4Addr::LOCALHOST, port, Duration::from_millis(500)).await;
        assert_eq!(name.as_deref(), Some("STROBE"));
    }
}
