//! Frame codec for the vendor discovery protocol
//!
//! Wire layout:
//! ```text
//! 0x01 | escape(message ++ crc16_le) | 0x04
//! ```
//! Requests carry a single opcode byte as the message. Responses carry
//! `ack (0xA0) ++ length (u32 LE) ++ payload`. The CRC always covers the
//! unescaped message bytes.

/// Frame start marker
pub const FRAME_START: u8 = 0x01;
/// Frame end marker
pub const FRAME_END: u8 = 0x04;
/// Escape byte; the following byte is taken literally
pub const ESCAPE: u8 = 0x10;

/// Discovery request opcode
pub const REQ_DISCOVERY: u8 = 0x20;
/// Acknowledge code leading every response
pub const ACK: u8 = 0xA0;

/// ack + 4-byte length + 2-byte checksum
const MIN_RESPONSE_LEN: usize = 1 + 4 + 2;

/// Kind of message carried by a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    AckResponse,
}

/// One frame of the vendor protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFrame {
    pub message_type: MessageType,
    /// Opcode byte for requests, identity blob for responses
    pub payload: Vec<u8>,
}

impl DiscoveryFrame {
    /// The discovery request frame
    pub fn request() -> Self {
        Self {
            message_type: MessageType::Request,
            payload: vec![REQ_DISCOVERY],
        }
    }

    /// An acknowledge response carrying `payload`
    pub fn response(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            message_type: MessageType::AckResponse,
            payload: payload.into(),
        }
    }

    /// Unescaped message bytes the checksum is computed over
    fn message(&self) -> Vec<u8> {
        match self.message_type {
            MessageType::Request => self.payload.clone(),
            MessageType::AckResponse => {
                let mut msg = Vec::with_capacity(5 + self.payload.len());
                msg.push(ACK);
                msg.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
                msg.extend_from_slice(&self.payload);
                msg
            }
        }
    }

    /// Encode to raw wire bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut body = self.message();
        let crc = crc16_xmodem(&body);
        body.extend_from_slice(&crc.to_le_bytes());

        let escaped = escape(&body);
        let mut frame = Vec::with_capacity(escaped.len() + 2);
        frame.push(FRAME_START);
        frame.extend_from_slice(&escaped);
        frame.push(FRAME_END);
        frame
    }

    /// Decode an acknowledge response; anything malformed yields `None`
    pub fn decode_response(raw: &[u8]) -> Option<Self> {
        if raw.len() < 2 || raw[0] != FRAME_START || raw[raw.len() - 1] != FRAME_END {
            return None;
        }

        let body = unescape(&raw[1..raw.len() - 1]);
        if body.len() < MIN_RESPONSE_LEN || body[0] != ACK {
            return None;
        }

        let length = u32::from_le_bytes([body[1], body[2], body[3], body[4]]) as usize;
        let payload_end = 5usize.checked_add(length)?;
        let crc_end = payload_end.checked_add(2)?;
        if crc_end > body.len() {
            return None;
        }

        let received = u16::from_le_bytes([body[payload_end], body[payload_end + 1]]);
        if received != crc16_xmodem(&body[..payload_end]) {
            return None;
        }

        Some(Self::response(&body[5..payload_end]))
    }
}

/// Prefix every marker or escape byte with the escape byte
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 4);
    for &b in data {
        if matches!(b, FRAME_START | FRAME_END | ESCAPE) {
            out.push(ESCAPE);
        }
        out.push(b);
    }
    out
}

/// Reverse of [`escape`]. A trailing lone escape byte is kept as-is.
pub fn unescape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.iter().copied();
    while let Some(b) = iter.next() {
        if b == ESCAPE {
            if let Some(next) = iter.next() {
                out.push(next);
                continue;
            }
        }
        out.push(b);
    }
    out
}

/// CRC-16/XMODEM: poly 0x1021, init 0, no reflection, no final xor
pub fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &b in data {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Raw bytes of the discovery request
pub fn build_discovery_request() -> Vec<u8> {
    DiscoveryFrame::request().encode()
}

/// Validate a response frame and return its payload
pub fn parse_response_frame(raw: &[u8]) -> Option<Vec<u8>> {
    DiscoveryFrame::decode_response(raw).map(|f| f.payload)
}
