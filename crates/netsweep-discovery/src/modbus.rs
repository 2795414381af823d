//! Modbus/TCP device identification (MEI "Read Device Identification")

use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Default Modbus/TCP port
pub const MODBUS_PORT: u16 = 502;

const FC_MEI: u8 = 0x2B;
const MEI_READ_DEVICE_ID: u8 = 0x0E;
const READ_DEVICE_ID_BASIC: u8 = 0x01;
const UNIT_ID: u8 = 0x01;
const MBAP_LEN: usize = 7;

/// Object ids read as a product/model name
const NAME_OBJECTS: [u8; 2] = [0x04, 0x05];
/// Object ids read as a serial-like string
const SERIAL_OBJECTS: [u8; 3] = [0x0E, 0x06, 0x07];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModbusIdentity {
    pub name: Option<String>,
    pub serial: Option<String>,
}

/// MBAP header + MEI request PDU
pub fn build_request() -> Vec<u8> {
    let pdu = [FC_MEI, MEI_READ_DEVICE_ID, READ_DEVICE_ID_BASIC, 0x00];
    let mut frame = Vec::with_capacity(MBAP_LEN + pdu.len());
    frame.extend_from_slice(&1u16.to_be_bytes()); // transaction id
    frame.extend_from_slice(&0u16.to_be_bytes()); // protocol id
    frame.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
    frame.push(UNIT_ID);
    frame.extend_from_slice(&pdu);
    frame
}

/// Parse the object list out of a Read Device Identification response
pub fn parse_response(data: &[u8]) -> ModbusIdentity {
    let mut identity = ModbusIdentity::default();

    let Some(pdu) = data.get(MBAP_LEN..) else {
        return identity;
    };
    // fc, mei, code, conformity, more, next id, count
    if pdu.len() < 7 || pdu[0] != FC_MEI || pdu[1] != MEI_READ_DEVICE_ID {
        return identity;
    }

    let count = pdu[6];
    let mut idx = 7;
    for _ in 0..count {
        let (Some(&obj_id), Some(&obj_len)) = (pdu.get(idx), pdu.get(idx + 1)) else {
            break;
        };
        idx += 2;
        let Some(value) = pdu.get(idx..idx + obj_len as usize) else {
            break;
        };
        idx += obj_len as usize;

        let text = String::from_utf8_lossy(value).trim().to_string();
        if text.is_empty() {
            continue;
        }
        if identity.name.is_none() && NAME_OBJECTS.contains(&obj_id) {
            identity.name = Some(text.clone());
        }
        if identity.serial.is_none() && SERIAL_OBJECTS.contains(&obj_id) {
            identity.serial = Some(text);
        }
    }

    identity
}

/// Query a Modbus/TCP device for its identification objects
pub async fn modbus_device_id(ip: Ipv4Addr, port: u16, limit: Duration) -> ModbusIdentity {
    let exchange = async {
        let mut stream = TcpStream::connect((ip, port)).await?;
        stream.write_all(&build_request()).await?;
        let mut buf = [0u8; 512];
        let n = stream.read(&mut buf).await?;
        Ok::<_, std::io::Error>(buf[..n].to_vec())
    };

    match timeout(limit, exchange).await {
        Ok(Ok(data)) if data.len() >= MBAP_LEN + 2 => parse_response(&data),
        Ok(Ok(_)) => ModbusIdentity::default(),
        Ok(Err(e)) => {
            trace!(ip = %ip, port, error = %e, "Modbus identification failed");
            ModbusIdentity::default()
        }
        Err(_) => ModbusIdentity::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn response(objects: &[(u8, &[u8])]) -> Vec<u8> {
        let mut pdu = vec![FC_MEI, MEI_READ_DEVICE_ID, READ_DEVICE_ID_BASIC, 0x01, 0x00, 0x00];
        pdu.push(objects.len() as u8);
        for (id, value) in objects {
            pdu.push(*id);
            pdu.push(value.len() as u8);
            pdu.extend_from_slice(value);
        }
        let mut frame = vec![0x00, 0x01, 0x00, 0x00];
        frame.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
        frame.push(UNIT_ID);
        frame.extend(pdu);
        frame
    }

    #[test]
    fn test_request_layout() {
        assert_eq!(
            build_request(),
            vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x2B, 0x0E, 0x01, 0x00]
        );
    }

    #[test]
    fn test_parse_name_and_serial() {
        let data = response(&[
            (0x00, b"Vendor"),
            (0x04, b" PLC-300 "),
            (0x05, b"ignored model"),
            (0x06, b"SN-991"),
        ]);
        let identity = parse_response(&data);
        assert_eq!(identity.name.as_deref(), Some("PLC-300"));
        assert_eq!(identity.serial.as_deref(), Some("SN-991"));
    }

    #[test]
    fn test_parse_truncated_object() {
        let mut data = response(&[(0x04, b"PLC-300")]);
        data.truncate(data.len() - 3);
        assert_eq!(parse_response(&data), ModbusIdentity::default());
    }

    #[test]
    fn test_parse_exception_response() {
        // exception: function code with high bit set
        let data = [0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0xAB, 0x01, 0x00];
        assert_eq!(parse_response(&data), ModbusIdentity::default());
    }

    #[tokio::test]
    async fn test_device_id_exchange() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let reply = response(&[(0x05, b"Model-X"), (0x0E, b"0042")]);
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 32];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(&reply).await;
            }
        });
        let identity = modbus_device_id(Ipv4Addr::LOCALHOST, port, Duration::from_millis(500)).await;
        assert_eq!(identity.name.as_deref(), Some("Model-X"));
        assert_eq!(identity.serial.as_deref(), Some("0042"));
    }
}
