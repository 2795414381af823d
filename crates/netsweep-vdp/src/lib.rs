//! Netsweep VDP - Vendor discovery protocol
//!
//! The vendor protocol wraps a short message in start/end markers with an
//! escaped interior and a CRC-16/XMODEM trailer. This crate provides:
//! - Frame encoding/decoding
//! - Heuristic identity extraction from response payloads
//! - UDP broadcast/unicast discovery and TCP identification

pub mod codec;
pub mod identity;
pub mod transport;

pub use codec::{
    build_discovery_request, crc16_xmodem, escape, parse_response_frame, unescape,
    DiscoveryFrame, MessageType,
};
pub use identity::{guess_identity, IdentityGuess, IdentityHints};
pub use transport::{tcp_gap_fill, tcp_identify, udp_discover, TransportError, UdpDiscovery};
